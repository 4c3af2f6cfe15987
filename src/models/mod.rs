pub mod conversation;
pub mod extraction;
pub mod rule;

pub use conversation::{ConversationEntry, Role};
pub use extraction::{DeletionRequest, ExtractedRule, ExtractionResult, ScoredItem};
pub use rule::Rule;
