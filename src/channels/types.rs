/// A chat message normalized away from platform-specific types.
#[derive(Debug, Clone)]
pub struct NormalizedMessage {
    /// Platform channel id, as stored in the conversation log.
    pub channel_id: String,
    pub user_id: String,
    pub user_name: String,
    pub text: String,
}

/// Outcome of dispatching one message. An empty response with no error
/// means the bot chose to stay silent.
#[derive(Debug, Clone)]
pub struct DispatchResult {
    pub response: String,
    pub error: Option<String>,
}

impl DispatchResult {
    pub fn success(response: impl Into<String>) -> Self {
        DispatchResult {
            response: response.into(),
            error: None,
        }
    }

    pub fn silent() -> Self {
        DispatchResult {
            response: String::new(),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        DispatchResult {
            response: String::new(),
            error: Some(message.into()),
        }
    }
}
