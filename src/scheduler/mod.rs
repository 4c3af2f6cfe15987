//! Rule scheduler.
//!
//! A single polling loop that runs for the process lifetime: every tick
//! it reloads the rule store, evaluates each active rule's condition tags
//! with AND semantics, and dispatches whatever triggered. There is no
//! cross-tick de-duplication — a rule whose condition stays true (an
//! elapsed condition with no new activity, say) fires again on every
//! tick, exactly as the condition reads.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use serenity::all::ChannelId;
use serenity::http::Http;

use crate::ai::Message;
use crate::channels::discord::split_message;
use crate::channels::dispatcher::NONE_SENTINEL;
use crate::memory::evaluate_tag;
use crate::models::{ConversationEntry, Role, Rule};
use crate::report;
use crate::BotState;

/// Fixed poll cadence. Exact-minute time conditions rely on this staying
/// at or below one minute.
const POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Rule actions containing this marker spawn the report generator
/// instead of an LLM reply.
const RUN_REPORT_SENTINEL: &str = "/run_report";

/// How many recent entries feed the trigger prompt.
const HISTORY_LIMIT: usize = 5;

/// Run the scheduler until the process exits. The first tick runs
/// immediately; afterwards the loop sleeps the fixed interval.
pub async fn run_scheduler(state: Arc<BotState>, http: Arc<Http>) {
    log::info!("[SCHEDULER] Started (poll interval: {}s)", POLL_INTERVAL.as_secs());
    let mut tick_count: u64 = 0;

    loop {
        tick_count += 1;
        log::debug!("[SCHEDULER] Tick #{}", tick_count);
        scheduler_tick(&state, &http).await;
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// One tick: load, evaluate, dispatch. A failing rule is logged and the
/// remaining rules still run; nothing here can end the loop.
async fn scheduler_tick(state: &Arc<BotState>, http: &Arc<Http>) {
    let rules = state.rules.load_all();
    let now = Local::now();
    let last = state.tracker.last_activity();

    let triggered = triggered_rules(&rules, now, last);
    if triggered.is_empty() {
        return;
    }

    log::info!("[SCHEDULER] {} rule(s) triggered", triggered.len());
    for rule in triggered {
        if let Err(e) = dispatch_rule(state, http, &rule).await {
            log::error!("[SCHEDULER] Rule '{}' dispatch failed: {}", rule.id, e);
        }
    }
}

/// Rules whose every condition tag evaluates true, in store order.
/// Inactive rules are skipped; evaluation short-circuits at the first
/// unmet condition.
pub fn triggered_rules(
    rules: &[Rule],
    now: DateTime<Local>,
    last_activity: Option<DateTime<Local>>,
) -> Vec<Rule> {
    let mut triggered = Vec::new();

    for rule in rules {
        if !rule.active {
            continue;
        }

        let all_met = rule
            .condition_tags
            .iter()
            .all(|tag| evaluate_tag(tag, now, last_activity));

        if all_met {
            log::info!("[SCHEDULER] Rule '{}' triggered", rule.id);
            triggered.push(rule.clone());
        }
    }

    triggered
}

/// Act on one triggered rule: either spawn the report generator (the
/// `/run_report` action marker) or generate and send a proactive message.
async fn dispatch_rule(state: &Arc<BotState>, http: &Arc<Http>, rule: &Rule) -> Result<(), String> {
    let channel = state.config.home_channel_id.to_string();

    if rule.action_description.contains(RUN_REPORT_SENTINEL) {
        let today = Local::now().format("%Y-%m-%d").to_string();
        log::info!("[SCHEDULER] Rule '{}' requests a daily report for {}", rule.id, today);
        report::spawn_report(&state.config.report_command, &today)?;

        let note = "Started generating the daily report.";
        state.log.append(&ConversationEntry::new(
            Role::Assistant,
            &state.config.bot_name,
            &channel,
            note,
        ))?;
        send_to_channel(state, http, note).await;
        return Ok(());
    }

    let history = state.log.recent(&channel, None, HISTORY_LIMIT);
    let now = Local::now();
    let prompt = state.prompts.build_rule_trigger_prompt(
        &state.facts.read(),
        &state.contextual.read(),
        now,
        state.tracker.elapsed_seconds(now),
        &history,
        &state.config.bot_name,
        &rule.condition_description,
        &rule.action_description,
    );

    let messages = vec![
        Message::system(state.prompts.response_system.clone()),
        Message::user(prompt),
    ];
    let answer = state.responder.generate_text(messages).await?.trim().to_string();

    log::info!("[SCHEDULER] Rule '{}' -> {}", rule.id, answer);
    state.log.append(&ConversationEntry::new(
        Role::Assistant,
        &state.config.bot_name,
        &channel,
        &answer,
    ))?;

    if answer == NONE_SENTINEL || answer.starts_with("/None ") {
        log::info!("[SCHEDULER] '/None' reply, nothing sent for rule '{}'", rule.id);
        return Ok(());
    }

    send_to_channel(state, http, &answer).await;
    Ok(())
}

async fn send_to_channel(state: &Arc<BotState>, http: &Arc<Http>, text: &str) {
    let channel_id = ChannelId::new(state.config.home_channel_id);
    for chunk in split_message(text, 2000) {
        if let Err(e) = channel_id.say(http.as_ref(), &chunk).await {
            log::error!("[SCHEDULER] Failed to send to channel {}: {}", channel_id, e);
        }
    }
}
