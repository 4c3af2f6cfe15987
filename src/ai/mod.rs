pub mod claude;

pub use claude::ClaudeClient;

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message { role: MessageRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message { role: MessageRole::User, content: content.into() }
    }
}

/// Unified AI client. The mock variant replays scripted responses and is
/// what the dispatcher/extraction tests run against.
pub enum AiClient {
    Claude(ClaudeClient),
    Mock(MockAiClient),
}

impl AiClient {
    pub async fn generate_text(&self, messages: Vec<Message>) -> Result<String, String> {
        match self {
            AiClient::Claude(client) => client.generate_text(messages).await,
            AiClient::Mock(client) => client.generate_text(messages),
        }
    }
}

/// Scripted stand-in for the real client: pops pre-configured responses
/// in order and records every prompt it was given.
pub struct MockAiClient {
    responses: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl MockAiClient {
    pub fn new(responses: Vec<Result<String, String>>) -> Self {
        MockAiClient {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn generate_text(&self, messages: Vec<Message>) -> Result<String, String> {
        self.requests.lock().push(messages);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err("MockAiClient: no scripted response left".to_string()))
    }

    /// Prompts seen so far, in call order.
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().clone()
    }
}
