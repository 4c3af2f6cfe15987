//! `!memory` — inspect and mutate the memory stores from chat.

use std::collections::HashSet;
use std::sync::Arc;

use crate::memory::{apply_extraction, extraction};
use crate::models::Rule;
use crate::BotState;

const HELP_TEXT: &str = "📋 **Memory commands**\n\
!memory status - file and rule counts\n\
!memory extract <text> - run memory extraction on the given text\n\
!memory add fact <text> - add a line to the facts document\n\
!memory add rule <text> - add a line to the contextual rules document\n\
!memory add explicit <json> - add an explicit rule\n\
!memory modify explicit <json> - replace an explicit rule by id\n\
!memory delete explicit <id> - delete an explicit rule\n\
!memory rules - list explicit rules\n\
!memory show [facts|rules|explicit] - show a store's contents\n\
!memory format explicit - explicit rule format guide\n\
!memory validate [fix] - check the rule store, optionally repairing it\n\n\
Rules can also be managed in plain conversation — \"delete the morning \
greeting rule\" works too.";

pub async fn execute(args: &str, user_name: &str, state: &Arc<BotState>) -> Result<String, String> {
    let (subcommand, rest) = split_word(args);

    match subcommand {
        "" => Ok(HELP_TEXT.to_string()),
        "status" => Ok(status(state)),
        "extract" => extract(rest, user_name, state).await,
        "add" => add(rest, state),
        "modify" => modify(rest, state),
        "delete" => delete(rest, state),
        "rules" => Ok(list_rules(state)),
        "show" => Ok(show(rest, state)),
        "format" => format_guide(rest),
        "validate" => validate(rest, state),
        other => Ok(format!(
            "❓ Unknown memory command `{}`. Try `!memory` for help.",
            other
        )),
    }
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim_start()),
        None => (text, ""),
    }
}

fn status(state: &Arc<BotState>) -> String {
    let facts_lines = state.facts.read().lines().count();
    let rules_lines = state.contextual.read().lines().count();
    let explicit = state.rules.load_all();
    let active = explicit.iter().filter(|r| r.active).count();

    format!(
        "🧠 **Memory status**\n\
         📄 facts.md: {} lines\n\
         📄 contextual_rules.md: {} lines\n\
         📄 explicit_rules.json: {} rules ({} active)\n\
         📝 conversation log: {} entries",
        facts_lines,
        rules_lines,
        explicit.len(),
        active,
        state.log.entry_count(),
    )
}

async fn extract(text: &str, _user_name: &str, state: &Arc<BotState>) -> Result<String, String> {
    if text.is_empty() {
        return Ok("❌ Usage: `!memory extract <text>`".to_string());
    }

    let result = match state.analyzer.analyze(text, &state.rules.load_all()).await {
        Some(r) => r,
        None => return Err("Extraction failed — no usable answer from the model".to_string()),
    };

    if result.has_valuable_info {
        apply_extraction(&result, &state.rules, &state.facts, &state.contextual);
    }

    let mut reply = String::from("✅ **Extraction result**\n");
    if result.facts.is_empty() {
        reply.push_str("**Facts:** none\n");
    } else {
        reply.push_str(&format!("**Facts ({}):**\n", result.facts.len()));
        for item in result.facts.iter().take(5) {
            reply.push_str(&format!("- {} ({}%)\n", item.content, item.confidence));
        }
        if result.facts.len() > 5 {
            reply.push_str(&format!("- ... and {} more\n", result.facts.len() - 5));
        }
    }

    if result.contextual_rules.is_empty() {
        reply.push_str("**Contextual rules:** none\n");
    } else {
        reply.push_str(&format!("**Contextual rules ({}):**\n", result.contextual_rules.len()));
        for item in result.contextual_rules.iter().take(3) {
            reply.push_str(&format!("- {} ({}%)\n", item.content, item.confidence));
        }
    }

    if result.explicit_rules.is_empty() {
        reply.push_str("**Explicit rules:** none\n");
    } else {
        reply.push_str(&format!("**Explicit rules ({}):**\n", result.explicit_rules.len()));
        for extracted in result.explicit_rules.iter().take(2) {
            reply.push_str(&format!(
                "- {} ({}) ({}%)\n",
                extracted.rule.id, extracted.rule.name, extracted.confidence
            ));
        }
    }

    if !result.rules_to_delete.is_empty() {
        let ids: Vec<&str> = result.rules_to_delete.iter().map(|d| d.id.as_str()).collect();
        reply.push_str(&format!("**Deletion requests:** {}\n", ids.join(", ")));
    }

    if !result.analysis.is_empty() {
        reply.push_str(&format!("\n_{}_", result.analysis));
    }
    Ok(reply)
}

fn add(args: &str, state: &Arc<BotState>) -> Result<String, String> {
    let (kind, content) = split_word(args);
    if content.is_empty() {
        return Ok("❌ Usage: `!memory add [fact|rule|explicit] <content>`".to_string());
    }

    match kind {
        "fact" => {
            state.facts.merge_facts(&[content.to_string()])?;
            Ok(format!("✅ Added to facts: `{}`", content))
        }
        "rule" => {
            state.contextual.merge_rules(&[content.to_string()])?;
            Ok(format!("✅ Added to contextual rules: `{}`", content))
        }
        "explicit" => upsert_json(content, state, "added"),
        other => Ok(format!(
            "❌ Unknown memory type `{}`. Use `fact`, `rule` or `explicit`.",
            other
        )),
    }
}

fn modify(args: &str, state: &Arc<BotState>) -> Result<String, String> {
    let (kind, content) = split_word(args);
    if kind != "explicit" || content.is_empty() {
        return Ok("❌ Usage: `!memory modify explicit <json>`".to_string());
    }
    upsert_json(content, state, "updated")
}

fn upsert_json(json_str: &str, state: &Arc<BotState>, verb: &str) -> Result<String, String> {
    let rule: Rule = serde_json::from_str(json_str)
        .map_err(|e| format!("Invalid rule JSON: {}. See `!memory format explicit`.", e))?;
    let id = rule.id.clone();
    state.rules.upsert(rule)?;
    Ok(format!("✅ Explicit rule `{}` {}.", id, verb))
}

fn delete(args: &str, state: &Arc<BotState>) -> Result<String, String> {
    let (kind, id) = split_word(args);
    if kind != "explicit" || id.is_empty() {
        return Ok(
            "❌ Usage: `!memory delete explicit <id>` (see `!memory rules` for ids)".to_string(),
        );
    }

    let mut ids = HashSet::new();
    ids.insert(id.to_string());
    if state.rules.delete_by_ids(&ids)? > 0 {
        Ok(format!("✅ Rule `{}` deleted.", id))
    } else {
        Ok(format!("❌ No rule with id `{}` found.", id))
    }
}

fn list_rules(state: &Arc<BotState>) -> String {
    let rules = state.rules.load_all();
    if rules.is_empty() {
        return "ℹ️ No explicit rules registered.".to_string();
    }

    let mut reply = String::from("📋 **Explicit rules**\n\n");
    for (i, rule) in rules.iter().enumerate() {
        let status = if rule.active { "✅ active" } else { "❌ inactive" };
        reply.push_str(&format!(
            "**{}. {}** (`{}`)\n  - status: {}\n  - conditions: `{}`\n  - {}\n\n",
            i + 1,
            rule.name,
            rule.id,
            status,
            rule.condition_tags.join(", "),
            rule.condition_description,
        ));
    }
    reply.push_str("Delete a rule with `!memory delete explicit <id>`.");
    reply
}

fn show(args: &str, state: &Arc<BotState>) -> String {
    let (kind, _) = split_word(args);
    match kind {
        "facts" => format!("📄 **facts.md**\n```md\n{}```", truncate(&state.facts.read(), 1900)),
        "rules" => format!(
            "📄 **contextual_rules.md**\n```md\n{}```",
            truncate(&state.contextual.read(), 1900)
        ),
        "explicit" => {
            let rules = state.rules.load_all();
            let json = serde_json::to_string_pretty(&rules).unwrap_or_default();
            format!("📄 **explicit_rules.json**\n```json\n{}```", truncate(&json, 1900))
        }
        "" => {
            let explicit = state.rules.load_all();
            let active = explicit.iter().filter(|r| r.active).count();
            format!(
                "📄 **Memory overview**\n\
                 - facts.md: {} items\n\
                 - contextual_rules.md: {} items\n\
                 - explicit rules: {} total ({} active, {} inactive)\n\n\
                 Use `!memory show [facts|rules|explicit]` for full contents.",
                count_items(&state.facts.read()),
                count_items(&state.contextual.read()),
                explicit.len(),
                active,
                explicit.len() - active,
            )
        }
        other => format!("❌ Unknown store `{}`. Use `facts`, `rules` or `explicit`.", other),
    }
}

fn format_guide(args: &str) -> Result<String, String> {
    let (kind, _) = split_word(args);
    if kind != "explicit" && !kind.is_empty() {
        return Ok("❌ Usage: `!memory format explicit`".to_string());
    }
    Ok(format!(
        "📝 **Explicit rule format**\n```\n{}\n```\n\
         Reusing an existing id replaces that rule entirely; invalid \
         condition tags are dropped, and a rule left without any gets the \
         default `time==08:00`.",
        extraction::rule_format_guide()
    ))
}

fn validate(args: &str, state: &Arc<BotState>) -> Result<String, String> {
    let issues = state.rules.validate();

    if issues.is_empty() {
        return Ok("✅ All rules are valid.".to_string());
    }

    let mut reply = format!("⚠️ **{} rule issue(s) found**\n\n", issues.len());
    for (id, issue) in &issues {
        reply.push_str(&format!("- `{}`: {}\n", id, issue));
    }

    let (fix, _) = split_word(args);
    if fix == "fix" {
        let fixed = state.rules.repair()?;
        reply.push_str(&format!("\n🔧 Repaired {} rule(s).", fixed));
    } else {
        reply.push_str("\nRun `!memory validate fix` to repair automatically.");
    }
    Ok(reply)
}

fn count_items(content: &str) -> usize {
    content.lines().filter(|l| l.starts_with("- ")).count()
}

fn truncate(text: &str, max_len: usize) -> String {
    if text.len() <= max_len {
        return text.to_string();
    }
    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}
