/*!
 * Client for OpenAI-compatible chat completions endpoints.
 *
 * Works against api.openai.com and any server speaking the same protocol.
 * The client performs no retries of its own; failures are surfaced with
 * enough detail (status code, Retry-After hint, timeout flag) for the
 * engine's retry controller to classify them.
 */

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{ChatMessage, ChatProvider, ChatRequest};

/// Maximum number of body characters copied into an error message.
const ERROR_BODY_LIMIT: usize = 500;

/// OpenAI-compatible API client
pub struct OpenAI {
    /// Base URL of the API, with or without a trailing /v1
    base_url: String,
    /// API key; sent as a Bearer token when non-empty
    api_key: String,
    /// HTTP client with the per-request timeout applied
    client: Client,
    /// Configured timeout, kept for error reporting
    timeout_ms: u64,
}

/// Wire format of a chat completions request
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    /// Model name
    model: &'a str,
    /// Conversation messages
    messages: &'a [ChatMessage],
    /// Sampling temperature
    temperature: f32,
    /// Completion token ceiling
    max_tokens: u32,
}

/// Wire format of a chat completions response
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    /// Completion choices; the first one carries the reply
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

/// One completion choice
#[derive(Debug, Deserialize)]
struct CompletionChoice {
    /// The generated message
    message: CompletionMessage,
}

/// The message inside a completion choice
#[derive(Debug, Deserialize)]
struct CompletionMessage {
    /// Reply content
    #[serde(default)]
    content: String,
}

impl OpenAI {
    /// Create a new client.
    pub fn new_with_config(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: Client::builder()
                .timeout(Duration::from_millis(timeout_ms))
                .build()
                .unwrap_or_default(),
            timeout_ms,
        }
    }

    /// Build the chat completions URL, handling a base URL that may or may
    /// not already end in /v1.
    fn chat_completions_url(&self) -> String {
        let trimmed = self.base_url.trim_end_matches('/');
        if trimmed.ends_with("/v1") {
            format!("{trimmed}/chat/completions")
        } else {
            format!("{trimmed}/v1/chat/completions")
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAI {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let url = self.chat_completions_url();
        let payload = CompletionRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut builder = self.client.post(&url).json(&payload);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    timeout_ms: self.timeout_ms,
                }
            } else {
                ProviderError::RequestFailed(e.to_string())
            }
        })?;

        let status = response.status();
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|secs| secs * 1000);

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    timeout_ms: self.timeout_ms,
                }
            } else {
                ProviderError::RequestFailed(e.to_string())
            }
        })?;

        if !status.is_success() {
            return Err(ProviderError::Api {
                status_code: status.as_u16(),
                message: truncate_body(&body),
                retry_after_ms,
            });
        }

        let parsed: CompletionResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::ParseError(format!("{e}: {}", truncate_body(&body))))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();
        if content.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(content)
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > ERROR_BODY_LIMIT {
        body.chars().take(ERROR_BODY_LIMIT).collect()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chatCompletionsUrl_plainBase_shouldAppendV1Path() {
        let client = OpenAI::new_with_config("https://api.example.com", "key", 1000);
        assert_eq!(
            client.chat_completions_url(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_chatCompletionsUrl_baseWithV1_shouldNotDuplicate() {
        let client = OpenAI::new_with_config("https://api.example.com/v1/", "key", 1000);
        assert_eq!(
            client.chat_completions_url(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_truncateBody_longBody_shouldBeClamped() {
        let body = "x".repeat(2000);
        assert_eq!(truncate_body(&body).len(), ERROR_BODY_LIMIT);
    }
}
