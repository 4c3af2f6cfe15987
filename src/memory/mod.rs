pub mod condition;
pub mod documents;
pub mod extraction;
pub mod rule_store;

pub use condition::{evaluate_tag, sanitize_tags, ConditionTag, DEFAULT_CONDITION_TAG};
pub use documents::MemoryDocument;
pub use extraction::{apply_extraction, MemoryAnalyzer};
pub use rule_store::RuleStore;

/// Minimum extraction confidence (0-100) for an item to be persisted.
/// The same threshold gates deletion requests.
pub const CONFIDENCE_THRESHOLD: u8 = 70;
