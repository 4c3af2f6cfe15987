//! `!diagnose` — live view of the scheduler's inputs.

use std::sync::Arc;

use chrono::Local;

use crate::memory::evaluate_tag;
use crate::BotState;

const HELP_TEXT: &str = "🔍 **Diagnostics**\n\
!diagnose - current time and last-activity state\n\
!diagnose rules - evaluate every rule's conditions right now\n\
!diagnose simulate <tag> - evaluate a single condition tag\n\
!diagnose touch - record activity now (testing aid)";

pub fn execute(args: &str, state: &Arc<BotState>) -> Result<String, String> {
    let (subcommand, rest) = match args.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (args, ""),
    };

    match subcommand {
        "" => Ok(overview(state)),
        "rules" => Ok(rules_report(state)),
        "simulate" => Ok(simulate(rest, state)),
        "touch" => Ok(touch(state)),
        _ => Ok(HELP_TEXT.to_string()),
    }
}

fn overview(state: &Arc<BotState>) -> String {
    let now = Local::now();
    let mut reply = format!(
        "🔍 **System diagnostics**\n⏰ Current time: {}\n",
        now.format("%Y-%m-%d %H:%M:%S")
    );

    match state.tracker.last_activity() {
        Some(last) => {
            let elapsed = now.signed_duration_since(last).num_seconds();
            reply.push_str(&format!(
                "📌 Last message: {} ({:.1} minutes ago)\n",
                last.format("%Y-%m-%d %H:%M:%S"),
                elapsed as f64 / 60.0
            ));
        }
        None => reply.push_str("⚠️ No message activity recorded yet.\n"),
    }
    reply
}

fn rules_report(state: &Arc<BotState>) -> String {
    let rules = state.rules.load_all();
    let now = Local::now();
    let last = state.tracker.last_activity();

    let mut reply = format!("📜 **Rule diagnostics** ({} rules)\n\n", rules.len());
    for rule in &rules {
        let status = if rule.active { "✅ active" } else { "❌ inactive" };
        reply.push_str(&format!("📌 `{}` ({})\n", rule.id, status));

        let mut all_met = true;
        for tag in &rule.condition_tags {
            let met = evaluate_tag(tag, now, last);
            all_met &= met;
            reply.push_str(&format!(
                "  - `{}`: {}\n",
                tag,
                if met { "✅ met" } else { "❌ not met" }
            ));
        }

        let verdict = if !rule.active {
            "inactive"
        } else if all_met {
            "would trigger now"
        } else {
            "would not trigger"
        };
        reply.push_str(&format!("  → {}\n\n", verdict));
    }
    reply
}

fn simulate(tag: &str, state: &Arc<BotState>) -> String {
    if tag.is_empty() {
        return "❌ Usage: `!diagnose simulate <condition-tag>`".to_string();
    }
    let met = evaluate_tag(tag, Local::now(), state.tracker.last_activity());
    format!(
        "🧪 `{}` → {}",
        tag,
        if met { "✅ condition met" } else { "❌ condition not met" }
    )
}

fn touch(state: &Arc<BotState>) -> String {
    let now = Local::now();
    state.tracker.record(now);
    format!("✅ Last message time set to {}", now.format("%Y-%m-%d %H:%M:%S"))
}
