//! Prefix-dispatched chat commands.
//!
//! Commands work anywhere the bot can read; each returns a formatted
//! text reply. Errors come back as replies too — a bad command never
//! takes anything down.

pub mod diagnose;
pub mod memory;
pub mod report;

use std::sync::Arc;

use crate::BotState;

/// Route a message to a command handler. Returns `None` when the text is
/// not a recognized command (the caller falls back to normal chat).
pub async fn handle(text: &str, user_name: &str, state: &Arc<BotState>) -> Option<String> {
    let trimmed = text.trim();

    let reply = if let Some(rest) = strip_command(trimmed, "!memory") {
        memory::execute(rest, user_name, state).await
    } else if let Some(rest) = strip_command(trimmed, "!diagnose") {
        diagnose::execute(rest, state)
    } else if let Some(rest) = strip_command(trimmed, "!report") {
        report::execute(rest, state)
    } else {
        return None;
    };

    Some(reply.unwrap_or_else(|e| format!("❌ {}", e)))
}

/// Match `prefix` as a whole word and return the argument remainder.
fn strip_command<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("")
    } else if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}
