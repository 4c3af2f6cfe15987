//! LLM-driven memory extraction.
//!
//! User text goes to the model with a structured-output instruction; the
//! categorized JSON that comes back is untrusted and gets re-validated
//! before anything touches the stores. Total parse failure means "no
//! extraction", never an error the caller has to handle.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ai::{AiClient, Message};
use crate::memory::condition::{sanitize_tags, ConditionTag};
use crate::memory::{MemoryDocument, RuleStore, CONFIDENCE_THRESHOLD};
use crate::models::{ExtractionResult, Rule};

/// Fenced ```json block, or the first bare `{...}` object.
static JSON_BLOCK_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```json\s*(.*?)\s*```|(\{.*\})").unwrap());

const EXTRACTION_SYSTEM_PROMPT: &str = "You are an expert at identifying and categorizing \
important information in text. Extract facts, preferences and rules from the user's message \
and return them as JSON. When writing explicit rules, use only the specified format.";

const RULE_FORMAT_GUIDE: &str = r#"Explicit rule format:
{
  "id": "unique_rule_id",
  "name": "Human-readable rule name",
  "condition_tags": ["tag1", "tag2"],
  "condition_description": "What the conditions mean",
  "action_description": "What to do when triggered",
  "active": true
}

Valid condition tag formats:
1. "time==HH:MM" - run at an exact time of day (e.g. "time==08:00")
2. "last_message_elapsed>N" - run once N seconds have passed since the last message (e.g. "last_message_elapsed>1200")
3. "weekday==N-M" - run on a weekday range, 1=Monday .. 7=Sunday (e.g. "weekday==1-5")

No other condition tag format is allowed."#;

const DELETION_GUIDE: &str = r#"Rule deletion requests:
- When the user asks to remove a rule, add its id to the "rules_to_delete" array.
- If the user names the rule only loosely, pick the most relevant id from the current rule list.
- When the user asks to change a rule into something new, add the old id to "rules_to_delete" and the replacement to "explicit_rules"."#;

pub struct MemoryAnalyzer {
    client: AiClient,
}

impl MemoryAnalyzer {
    pub fn new(client: AiClient) -> Self {
        MemoryAnalyzer { client }
    }

    /// Analyze one user message. Returns `None` when the model call fails
    /// or no JSON can be recovered from its output — the caller treats
    /// that as "no extraction".
    pub async fn analyze(&self, user_text: &str, current_rules: &[Rule]) -> Option<ExtractionResult> {
        let prompt = build_extraction_prompt(user_text, current_rules);
        let messages = vec![Message::system(EXTRACTION_SYSTEM_PROMPT), Message::user(prompt)];

        let response = match self.client.generate_text(messages).await {
            Ok(text) => text,
            Err(e) => {
                log::error!("[MEMORY] Extraction call failed: {}", e);
                return None;
            }
        };

        let mut result = parse_extraction_response(&response)?;
        validate_extracted_rules(&mut result);
        result.rules_to_delete.retain(|req| {
            if req.confidence >= CONFIDENCE_THRESHOLD {
                true
            } else {
                log::info!(
                    "[MEMORY] Ignoring low-confidence deletion of '{}' ({}%)",
                    req.id,
                    req.confidence
                );
                false
            }
        });

        log::info!(
            "[MEMORY] Extraction complete: {} (valuable: {})",
            if result.analysis.is_empty() { "no summary" } else { result.analysis.as_str() },
            result.has_valuable_info
        );
        Some(result)
    }
}

/// Recover the JSON payload from the model's reply: fenced block first,
/// then a bare object, then the whole reply as a last resort.
pub fn parse_extraction_response(response: &str) -> Option<ExtractionResult> {
    if let Some(caps) = JSON_BLOCK_PATTERN.captures(response) {
        let json_str = caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())?;
        if let Ok(result) = serde_json::from_str::<ExtractionResult>(json_str) {
            return Some(result);
        }
    }

    match serde_json::from_str::<ExtractionResult>(response.trim()) {
        Ok(result) => Some(result),
        Err(_) => {
            let preview: String = response.chars().take(100).collect();
            log::error!("[MEMORY] No JSON found in extraction response: {}...", preview);
            None
        }
    }
}

/// Re-validate condition tags on every extracted rule; the model's output
/// does not get to bypass the tag grammar.
fn validate_extracted_rules(result: &mut ExtractionResult) {
    for extracted in result.explicit_rules.iter_mut() {
        let rule = &mut extracted.rule;
        for tag in rule.condition_tags.iter().filter(|t| ConditionTag::parse(t).is_none()) {
            log::warn!("[MEMORY] Removing invalid condition tag: '{}'", tag);
        }
        let had_valid = rule.condition_tags.iter().any(|t| ConditionTag::parse(t).is_some());
        rule.condition_tags = sanitize_tags(&rule.condition_tags);
        if !had_valid {
            log::warn!(
                "[MEMORY] Rule '{}' had no valid conditions, default applied",
                rule.id
            );
        }
    }
}

/// Persist an extraction: confidence-filter each category, merge the
/// document lines, then delete and upsert explicit rules. Returns the
/// number of stores that changed.
pub fn apply_extraction(
    result: &ExtractionResult,
    rules: &RuleStore,
    facts: &MemoryDocument,
    contextual: &MemoryDocument,
) -> usize {
    let confident = |items: &[crate::models::ScoredItem]| -> Vec<String> {
        items
            .iter()
            .filter(|i| i.confidence >= CONFIDENCE_THRESHOLD)
            .map(|i| i.content.clone())
            .collect()
    };

    let fact_lines = confident(&result.facts);
    let rule_lines = confident(&result.contextual_rules);
    let explicit: Vec<Rule> = result
        .explicit_rules
        .iter()
        .filter(|r| r.confidence >= CONFIDENCE_THRESHOLD)
        .map(|r| r.rule.clone())
        .collect();
    let delete_ids: HashSet<String> = result
        .rules_to_delete
        .iter()
        .filter(|r| r.confidence >= CONFIDENCE_THRESHOLD)
        .map(|r| r.id.clone())
        .collect();

    let mut updates = 0;

    if !fact_lines.is_empty() {
        log::info!("[MEMORY] Updating {} fact(s)", fact_lines.len());
        match facts.merge_facts(&fact_lines) {
            Ok(_) => updates += 1,
            Err(e) => log::error!("[MEMORY] Fact merge failed: {}", e),
        }
    }

    if !rule_lines.is_empty() {
        log::info!("[MEMORY] Updating {} contextual rule(s)", rule_lines.len());
        match contextual.merge_rules(&rule_lines) {
            Ok(_) => updates += 1,
            Err(e) => log::error!("[MEMORY] Contextual rule merge failed: {}", e),
        }
    }

    if !delete_ids.is_empty() {
        match rules.delete_by_ids(&delete_ids) {
            Ok(n) if n > 0 => updates += 1,
            Ok(_) => {}
            Err(e) => log::error!("[MEMORY] Rule deletion failed: {}", e),
        }
    }

    if !explicit.is_empty() {
        let mut touched = false;
        for rule in explicit {
            if rule.id.is_empty() {
                log::warn!("[MEMORY] Skipping extracted rule without an id");
                continue;
            }
            match rules.upsert(rule) {
                Ok(()) => touched = true,
                Err(e) => log::error!("[MEMORY] Rule upsert failed: {}", e),
            }
        }
        if touched {
            updates += 1;
        }
    }

    log::info!("[MEMORY] Memory update complete: {} store(s) changed", updates);
    updates
}

fn build_extraction_prompt(user_text: &str, current_rules: &[Rule]) -> String {
    let mut rule_list = String::from("Currently registered rules:\n");
    if current_rules.is_empty() {
        rule_list.push_str("- (none)\n");
    }
    for rule in current_rules {
        rule_list.push_str(&format!(
            "- id: {}, name: {}, condition: {}\n",
            rule.id, rule.name, rule.condition_description
        ));
    }

    format!(
        r#"Analyze the following user message and identify information worth remembering.

User message:
"{user_text}"

Classify what you find into these categories:
1. facts - the user's preferences, personal details, daily routines, plans
2. contextual_rules - requests about conversational style or how to respond in specific situations
3. explicit_rules - automatic actions to run at specific times or conditions
4. rules_to_delete - requests to remove an existing rule

Guidelines:
- Report nothing for a category without relevant information.
- Do not include information you are unsure about.
- Give every extracted item a confidence score between 0 and 100.
- To modify an existing rule, reuse its id; for a new rule, invent a unique English id.

{rule_format}

{deletion_guide}

{rule_list}
Respond with JSON in exactly this shape:
{{
  "facts": [
    {{ "content": "item", "confidence": 85 }}
  ],
  "contextual_rules": [
    {{ "content": "item", "confidence": 80 }}
  ],
  "explicit_rules": [
    {{
      "id": "rule_id",
      "name": "Rule name",
      "condition_tags": ["time==HH:MM", "weekday==N-M"],
      "condition_description": "What the conditions mean",
      "action_description": "What to do when triggered",
      "active": true,
      "confidence": 75
    }}
  ],
  "rules_to_delete": [
    {{ "id": "rule_id_to_delete", "confidence": 90 }}
  ],
  "analysis": "Short summary of the analysis",
  "has_valuable_info": true
}}"#,
        user_text = user_text,
        rule_format = RULE_FORMAT_GUIDE,
        deletion_guide = DELETION_GUIDE,
        rule_list = rule_list,
    )
}

/// The rule format guide, also shown by the `!memory format explicit`
/// command.
pub fn rule_format_guide() -> &'static str {
    RULE_FORMAT_GUIDE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockAiClient;
    use crate::memory::DEFAULT_CONDITION_TAG;
    use tempfile::TempDir;

    fn stores(dir: &TempDir) -> (RuleStore, MemoryDocument, MemoryDocument) {
        (
            RuleStore::new(dir.path().join("explicit_rules.json")),
            MemoryDocument::new(dir.path().join("facts.md"), "# User Information", "Other"),
            MemoryDocument::new(
                dir.path().join("contextual_rules.md"),
                "# Contextual Rules",
                "Other Rules",
            ),
        )
    }

    #[test]
    fn parses_fenced_json_block() {
        let response = "Here is my analysis:\n```json\n{\"facts\": [{\"content\": \"Likes tea\", \"confidence\": 90}], \"has_valuable_info\": true}\n```\nDone.";
        let result = parse_extraction_response(response).unwrap();
        assert_eq!(result.facts.len(), 1);
        assert!(result.has_valuable_info);
    }

    #[test]
    fn parses_bare_json_object() {
        let response = "{\"analysis\": \"nothing new\", \"has_valuable_info\": false}";
        let result = parse_extraction_response(response).unwrap();
        assert!(!result.has_valuable_info);
        assert_eq!(result.analysis, "nothing new");
    }

    #[test]
    fn garbage_response_yields_none() {
        assert!(parse_extraction_response("I could not find anything useful.").is_none());
        assert!(parse_extraction_response("").is_none());
    }

    #[tokio::test]
    async fn analyze_defaults_invalid_tags() {
        let response = r#"{
            "explicit_rules": [{
                "id": "nap", "name": "Nap time",
                "condition_tags": ["whenever_sleepy"],
                "action_description": "Suggest a nap",
                "active": true, "confidence": 80
            }],
            "has_valuable_info": true
        }"#;
        let analyzer = MemoryAnalyzer::new(AiClient::Mock(MockAiClient::new(vec![Ok(
            response.to_string(),
        )])));

        let result = analyzer.analyze("naps are great", &[]).await.unwrap();
        assert_eq!(
            result.explicit_rules[0].rule.condition_tags,
            vec![DEFAULT_CONDITION_TAG]
        );
    }

    #[tokio::test]
    async fn analyze_drops_low_confidence_deletions() {
        let response = r#"{
            "rules_to_delete": [
                {"id": "morning_greeting", "confidence": 90},
                {"id": "lunch", "confidence": 40}
            ],
            "has_valuable_info": true
        }"#;
        let analyzer = MemoryAnalyzer::new(AiClient::Mock(MockAiClient::new(vec![Ok(
            response.to_string(),
        )])));

        let result = analyzer.analyze("drop those rules", &[]).await.unwrap();
        assert_eq!(result.rules_to_delete.len(), 1);
        assert_eq!(result.rules_to_delete[0].id, "morning_greeting");
    }

    #[tokio::test]
    async fn failed_call_yields_none() {
        let analyzer =
            MemoryAnalyzer::new(AiClient::Mock(MockAiClient::new(vec![Err("boom".to_string())])));
        assert!(analyzer.analyze("hello", &[]).await.is_none());
    }

    #[test]
    fn apply_respects_confidence_threshold() {
        let dir = TempDir::new().unwrap();
        let (rules, facts, contextual) = stores(&dir);

        let result: ExtractionResult = serde_json::from_str(
            r#"{
                "facts": [
                    {"content": "Birthday: March 5", "confidence": 85},
                    {"content": "Maybe allergic to cats", "confidence": 65}
                ],
                "has_valuable_info": true
            }"#,
        )
        .unwrap();

        apply_extraction(&result, &rules, &facts, &contextual);
        let content = facts.read();
        assert!(content.contains("Birthday: March 5"));
        assert!(!content.contains("allergic"));
    }

    #[test]
    fn apply_deletes_then_upserts_rules() {
        let dir = TempDir::new().unwrap();
        let (rules, facts, contextual) = stores(&dir);
        rules
            .upsert(Rule {
                id: "morning_greeting".to_string(),
                name: "Morning greeting".to_string(),
                condition_tags: vec!["time==08:00".to_string()],
                condition_description: String::new(),
                action_description: "Say good morning".to_string(),
                active: true,
            })
            .unwrap();

        let result: ExtractionResult = serde_json::from_str(
            r#"{
                "explicit_rules": [{
                    "id": "evening_greeting", "name": "Evening greeting",
                    "condition_tags": ["time==21:00"],
                    "condition_description": "Every evening at nine",
                    "action_description": "Say good evening",
                    "active": true, "confidence": 88
                }],
                "rules_to_delete": [{"id": "morning_greeting", "confidence": 95}],
                "has_valuable_info": true
            }"#,
        )
        .unwrap();

        apply_extraction(&result, &rules, &facts, &contextual);
        let stored = rules.load_all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, "evening_greeting");
    }

    #[test]
    fn apply_skips_low_confidence_rules() {
        let dir = TempDir::new().unwrap();
        let (rules, facts, contextual) = stores(&dir);

        let result: ExtractionResult = serde_json::from_str(
            r#"{
                "explicit_rules": [{
                    "id": "hesitant", "condition_tags": ["time==10:00"],
                    "active": true, "confidence": 50
                }],
                "has_valuable_info": true
            }"#,
        )
        .unwrap();

        assert_eq!(apply_extraction(&result, &rules, &facts, &contextual), 0);
        assert!(rules.load_all().is_empty());
    }
}
