//! Message dispatch pipeline.
//!
//! Every inbound chat message is logged, mined for memory, answered with
//! the full memory context, and the answer logged back. A reply of
//! exactly "/None" is the model declining to speak: it is logged but the
//! caller gets an empty response to not send.

use std::sync::Arc;

use chrono::Local;

use crate::channels::types::{DispatchResult, NormalizedMessage};
use crate::memory::apply_extraction;
use crate::models::{ConversationEntry, Role};
use crate::ai::Message;
use crate::BotState;

/// How many recent entries feed the prompt.
const HISTORY_LIMIT: usize = 5;

/// The model's "send nothing" sentinel.
pub const NONE_SENTINEL: &str = "/None";

pub struct MessageDispatcher {
    state: Arc<BotState>,
}

impl MessageDispatcher {
    pub fn new(state: Arc<BotState>) -> Self {
        MessageDispatcher { state }
    }

    pub fn state(&self) -> &Arc<BotState> {
        &self.state
    }

    /// Dispatch a normalized message and return the reply to send.
    pub async fn dispatch(&self, message: NormalizedMessage) -> DispatchResult {
        let state = &self.state;

        log::info!(
            "[DISPATCH] #{} {} -> {}",
            message.channel_id,
            message.user_name,
            message.text
        );

        let entry = ConversationEntry::new(
            Role::User,
            &message.user_name,
            &message.channel_id,
            &message.text,
        );
        if let Err(e) = state.log.append(&entry) {
            log::error!("[DISPATCH] Failed to log user message: {}", e);
        }

        // Memory extraction is best-effort: a failed or empty extraction
        // never blocks the reply.
        if let Some(result) = state.analyzer.analyze(&message.text, &state.rules.load_all()).await {
            if result.has_valuable_info {
                apply_extraction(&result, &state.rules, &state.facts, &state.contextual);
            } else {
                log::info!("[DISPATCH] Nothing worth remembering in this message");
            }
        }

        let history = state
            .log
            .recent(&message.channel_id, Some(&message.user_name), HISTORY_LIMIT);
        let now = Local::now();
        let prompt = state.prompts.build_chat_prompt(
            &state.facts.read(),
            &state.contextual.read(),
            now,
            state.tracker.elapsed_seconds(now),
            &history,
            &state.config.bot_name,
            &message.text,
        );

        let messages = vec![
            Message::system(state.prompts.response_system.clone()),
            Message::user(prompt),
        ];
        let answer = match state.responder.generate_text(messages).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                log::error!("[DISPATCH] Response generation failed: {}", e);
                return DispatchResult::error(e);
            }
        };

        log::info!("[DISPATCH] #{} {} -> {}", message.channel_id, state.config.bot_name, answer);

        // The declined reply still goes in the log.
        let reply_entry = ConversationEntry::new(
            Role::Assistant,
            &state.config.bot_name,
            &message.channel_id,
            &answer,
        );
        if let Err(e) = state.log.append(&reply_entry) {
            log::error!("[DISPATCH] Failed to log assistant message: {}", e);
        }

        if answer == NONE_SENTINEL || answer.starts_with("/None ") {
            log::info!("[DISPATCH] '/None' reply, staying silent");
            return DispatchResult::silent();
        }

        DispatchResult::success(answer)
    }
}
