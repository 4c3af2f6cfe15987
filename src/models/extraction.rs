use serde::{Deserialize, Serialize};

use crate::models::Rule;

/// A candidate memory line with the model's confidence in it (0-100).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredItem {
    pub content: String,
    #[serde(default)]
    pub confidence: u8,
}

/// An explicit rule proposed by extraction, carrying a confidence score
/// that is stripped before the rule is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedRule {
    #[serde(flatten)]
    pub rule: Rule,
    #[serde(default)]
    pub confidence: u8,
}

/// A request to delete an existing rule by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionRequest {
    pub id: String,
    #[serde(default)]
    pub confidence: u8,
}

/// Categorized output of one memory-extraction call.
///
/// The payload comes from an LLM and is untrusted: every collection
/// defaults to empty, and rule condition tags are re-validated before
/// anything is persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub facts: Vec<ScoredItem>,
    #[serde(default)]
    pub contextual_rules: Vec<ScoredItem>,
    #[serde(default)]
    pub explicit_rules: Vec<ExtractedRule>,
    #[serde(default)]
    pub rules_to_delete: Vec<DeletionRequest>,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub has_valuable_info: bool,
}
