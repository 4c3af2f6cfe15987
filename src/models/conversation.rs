use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Who produced a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of the append-only conversation log.
///
/// Serialized as newline-delimited JSON; entries are never mutated or
/// deleted after being written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Role,
    pub name: String,
    pub channel: String,
    pub content: String,
    pub time: DateTime<Local>,
}

impl ConversationEntry {
    pub fn new(role: Role, name: &str, channel: &str, content: &str) -> Self {
        ConversationEntry {
            role,
            name: name.to_string(),
            channel: channel.to_string(),
            content: content.to_string(),
            time: Local::now(),
        }
    }
}
