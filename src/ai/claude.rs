//! Anthropic Messages API client.
//!
//! Plain-text completion only: system prompt + user prompt in, text out.
//! Transient failures (429/502/503/504) are retried with exponential
//! backoff; everything else surfaces as an error string the caller logs.

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ai::{Message, MessageRole};

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const MAX_RETRIES: u32 = 3;
const BASE_DELAY_MS: u64 = 2000;

#[derive(Clone)]
pub struct ClaudeClient {
    client: Client,
    auth_headers: header::HeaderMap,
    endpoint: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ClaudeCompletionRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ClaudeCompletionResponse {
    content: Vec<ClaudeResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponseContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeErrorResponse {
    error: ClaudeError,
}

#[derive(Debug, Deserialize)]
struct ClaudeError {
    message: String,
}

impl ClaudeClient {
    pub fn new(
        api_key: &str,
        model: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<Self, String> {
        let mut auth_headers = header::HeaderMap::new();
        auth_headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        let auth_value = header::HeaderValue::from_str(api_key)
            .map_err(|e| format!("Invalid API key format: {}", e))?;
        auth_headers.insert("x-api-key", auth_value);
        auth_headers.insert(
            "anthropic-version",
            header::HeaderValue::from_static("2023-06-01"),
        );

        Ok(Self {
            client: Client::new(),
            auth_headers,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: model.to_string(),
            max_tokens,
            temperature,
        })
    }

    pub async fn generate_text(&self, messages: Vec<Message>) -> Result<String, String> {
        // Anthropic takes the system prompt as a top-level field
        let mut system_message = None;
        let filtered_messages: Vec<Message> = messages
            .into_iter()
            .filter(|m| {
                if m.role == MessageRole::System {
                    system_message = Some(m.content.clone());
                    false
                } else {
                    true
                }
            })
            .collect();

        let api_messages: Vec<ApiMessage> = filtered_messages
            .into_iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: m.content,
            })
            .collect();

        let request = ClaudeCompletionRequest {
            model: self.model.clone(),
            messages: api_messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: system_message,
        };

        let mut last_error: Option<String> = None;
        let mut response_data_opt: Option<ClaudeCompletionResponse> = None;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let delay_ms = BASE_DELAY_MS * (1 << (attempt - 1));
                log::warn!(
                    "[CLAUDE] Retry attempt {}/{} after {}ms delay",
                    attempt,
                    MAX_RETRIES,
                    delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let request_result = self
                .client
                .post(&self.endpoint)
                .headers(self.auth_headers.clone())
                .json(&request)
                .send()
                .await;

            let response = match request_result {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(format!("Claude API request failed: {}", e));
                    if attempt < MAX_RETRIES {
                        log::warn!(
                            "[CLAUDE] Request failed (attempt {}): {}, will retry",
                            attempt + 1,
                            e
                        );
                        continue;
                    }
                    return Err(last_error.unwrap());
                }
            };

            let status = response.status();
            let is_retryable = matches!(status.as_u16(), 429 | 502 | 503 | 504);

            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();

                if is_retryable && attempt < MAX_RETRIES {
                    log::warn!(
                        "[CLAUDE] Received retryable status {} (attempt {}), will retry",
                        status,
                        attempt + 1
                    );
                    last_error = Some(format!("HTTP {}: {}", status, error_text));
                    continue;
                }

                if let Ok(error_response) = serde_json::from_str::<ClaudeErrorResponse>(&error_text)
                {
                    return Err(format!("Claude API error: {}", error_response.error.message));
                }
                return Err(format!(
                    "Claude API returned error status: {}, body: {}",
                    status, error_text
                ));
            }

            response_data_opt = Some(
                response
                    .json()
                    .await
                    .map_err(|e| format!("Failed to parse Claude response: {}", e))?,
            );
            break;
        }

        let response_data = response_data_opt
            .ok_or_else(|| last_error.unwrap_or_else(|| "Max retries exceeded".to_string()))?;

        let content: String = response_data
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text.clone())
            .collect();

        if content.is_empty() {
            return Err("Claude API returned no content".to_string());
        }

        Ok(content)
    }
}
