//! `!report [YYYY-MM-DD]` — kick off the external daily-report generator.

use std::sync::Arc;

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::report::spawn_report;
use crate::BotState;

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

pub fn execute(args: &str, state: &Arc<BotState>) -> Result<String, String> {
    let date = match args.split_whitespace().next() {
        Some(arg) if DATE_PATTERN.is_match(arg) => arg.to_string(),
        Some(arg) => {
            return Ok(format!(
                "❌ `{}` is not a date. Usage: `!report [YYYY-MM-DD]` (defaults to today)",
                arg
            ));
        }
        None => Local::now().format("%Y-%m-%d").to_string(),
    };

    spawn_report(&state.config.report_command, &date)?;
    Ok(format!(
        "📊 Generating the daily report for {}. It will appear in the report channel when done.",
        date
    ))
}
