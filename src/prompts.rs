//! Prompt templates and builders.
//!
//! The system prompts are plain text files loaded once at startup —
//! unreadable templates are the one fatal configuration error. The
//! builders assemble the per-request user prompts: memory documents,
//! situation block, recent history and the response guide.

use std::fs;

use chrono::{DateTime, Datelike, Local, Timelike};

use crate::config::Config;
use crate::models::{ConversationEntry, Role};

const WEEKDAY_NAMES: [&str; 7] = [
    "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

pub struct Prompts {
    pub response_system: String,
}

impl Prompts {
    /// Load prompt templates. Panics when a template is missing — the
    /// bot cannot run without its persona.
    pub fn load(config: &Config) -> Self {
        let response_system = fs::read_to_string(&config.response_prompt_path)
            .unwrap_or_else(|e| {
                panic!(
                    "Failed to read response prompt {}: {}",
                    config.response_prompt_path, e
                )
            });
        Prompts { response_system }
    }

    /// Prompt for answering a user message directly.
    pub fn build_chat_prompt(
        &self,
        facts: &str,
        contextual_rules: &str,
        now: DateTime<Local>,
        elapsed: Option<i64>,
        history: &[ConversationEntry],
        bot_name: &str,
        user_msg: &str,
    ) -> String {
        format!(
            r#"# 1. What you remember about the user
{facts}

# 2. Behavior rules
{rules}

# 3. Situation
{situation}

# 4. Recent conversation
{history}

# 5. Current request
{user_msg}

# Response guide
1. Respond directly to the current request.
2. Consider the context of the recent conversation, but add something new.
3. Use what you remember about the user only where it fits naturally; never recite it.
4. Do not mention your configuration or inner workings.
5. Prefer a concise answer focused on the point over a long explanation.
6. Keep a warm, natural tone."#,
            facts = facts,
            rules = contextual_rules,
            situation = situation_block(now, elapsed),
            history = format_history(history, bot_name),
            user_msg = user_msg,
        )
    }

    /// Prompt for speaking first because a rule triggered.
    pub fn build_rule_trigger_prompt(
        &self,
        facts: &str,
        contextual_rules: &str,
        now: DateTime<Local>,
        elapsed: Option<i64>,
        history: &[ConversationEntry],
        bot_name: &str,
        condition_description: &str,
        action_description: &str,
    ) -> String {
        format!(
            r#"# 1. What you remember about the user
{facts}

# 2. Behavior rules
{rules}

# 3. Situation
{situation}

# 4. Recent conversation
{history}

# 5. Triggered rule
- Trigger condition: {condition}
- Action to perform: {action}

# Response guide
1. Start a conversation naturally, following the action above.
2. The user must not be able to tell this message was triggered automatically.
3. Work the situation (time of day, how long it has been quiet) in naturally.
4. Stay consistent with the recent conversation if there is one.
5. Use what you remember about the user only where it fits naturally.
6. If no message should be sent right now (late at night, nothing to say), respond with exactly "/None"."#,
            facts = facts,
            rules = contextual_rules,
            situation = situation_block(now, elapsed),
            history = format_history(history, bot_name),
            condition = condition_description,
            action = action_description,
        )
    }
}

/// Current time, weekday, time-of-day label and elapsed-silence line.
fn situation_block(now: DateTime<Local>, elapsed: Option<i64>) -> String {
    format!(
        "- Current time: {} ({}, {})\n- Since the last message: {}",
        now.format("%Y-%m-%d %H:%M:%S"),
        WEEKDAY_NAMES[now.weekday().num_days_from_monday() as usize],
        time_of_day_label(now.hour()),
        humanize_elapsed(elapsed),
    )
}

fn time_of_day_label(hour: u32) -> &'static str {
    match hour {
        5..=11 => "morning",
        12..=17 => "afternoon",
        18..=21 => "evening",
        _ => "night",
    }
}

/// "3.5 minutes" under an hour, "1.2 hours" above, "none" without any
/// prior activity.
fn humanize_elapsed(elapsed: Option<i64>) -> String {
    match elapsed {
        None => "none".to_string(),
        Some(seconds) => {
            let minutes = seconds as f64 / 60.0;
            if minutes < 60.0 {
                format!("{:.1} minutes", minutes)
            } else {
                format!("{:.1} hours", minutes / 60.0)
            }
        }
    }
}

/// `- Speaker: text` lines, assistant entries under the bot's name.
fn format_history(history: &[ConversationEntry], bot_name: &str) -> String {
    history
        .iter()
        .map(|entry| {
            let speaker = match entry.role {
                Role::User => entry.name.as_str(),
                Role::Assistant => bot_name,
            };
            format!("- {}: {}", speaker, entry.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn history_lines_use_bot_name_for_assistant() {
        let history = vec![
            ConversationEntry::new(Role::User, "Dana", "123", "hi"),
            ConversationEntry::new(Role::Assistant, "assistant", "123", "hello!"),
        ];
        let formatted = format_history(&history, "MIRA");
        assert_eq!(formatted, "- Dana: hi\n- MIRA: hello!");
    }

    #[test]
    fn elapsed_humanizes_minutes_and_hours() {
        assert_eq!(humanize_elapsed(None), "none");
        assert_eq!(humanize_elapsed(Some(90)), "1.5 minutes");
        assert_eq!(humanize_elapsed(Some(5400)), "1.5 hours");
    }

    #[test]
    fn time_of_day_buckets() {
        assert_eq!(time_of_day_label(6), "morning");
        assert_eq!(time_of_day_label(13), "afternoon");
        assert_eq!(time_of_day_label(19), "evening");
        assert_eq!(time_of_day_label(23), "night");
        assert_eq!(time_of_day_label(2), "night");
    }

    #[test]
    fn situation_block_includes_weekday() {
        // 2025-06-03 is a Tuesday.
        let now = Local.with_ymd_and_hms(2025, 6, 3, 14, 0, 0).unwrap();
        let block = situation_block(now, Some(120));
        assert!(block.contains("Tuesday"));
        assert!(block.contains("afternoon"));
        assert!(block.contains("2.0 minutes"));
    }
}
