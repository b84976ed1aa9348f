/*!
 * Mock provider implementations for testing.
 *
 * The mock understands the JSON envelopes the engine sends: translation
 * requests are answered per segment, judge requests per item. Behaviors
 * cover the interesting failure modes:
 * - `MockProvider::echo()` - translates every segment by prefixing it
 * - `MockProvider::echo_verbatim()` - returns source text unchanged
 * - `MockProvider::plain_strings()` - replies with a positional string array
 * - `MockProvider::drop_last_entry()` - omits one translation per reply
 * - `MockProvider::fail_status(..)` - always fails with an HTTP status
 * - `MockProvider::fail_first(..)` - fails N times, then echoes
 */

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::{ChatProvider, ChatRequest};

/// Prefix applied by the echoing behaviors.
pub const ECHO_PREFIX: &str = "中译:";

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Translate every segment by prefixing it; judge rejects everything
    Echo,
    /// Like Echo, but the judge accepts everything
    EchoAcceptingJudge,
    /// Return every segment's source text unchanged
    EchoVerbatim,
    /// Reply with a positional string array instead of id/text objects
    PlainStrings,
    /// Omit the last segment from every multi-segment reply; single-segment
    /// requests are answered normally
    DropLastEntry,
    /// Always fail with the given HTTP status
    FailStatus {
        /// Status code to report
        status: u16,
    },
    /// Fail the first N requests with the given status, then echo
    FailFirst {
        /// Number of leading requests that fail
        failures: usize,
        /// Status code to report
        status: u16,
    },
}

/// Mock provider for exercising the translation engine
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Total requests seen
    request_count: AtomicUsize,
    /// Captured requests for assertions
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a working mock that prefixes every segment
    pub fn echo() -> Self {
        Self::new(MockBehavior::Echo)
    }

    /// Create a working mock whose judge accepts everything
    pub fn echo_accepting_judge() -> Self {
        Self::new(MockBehavior::EchoAcceptingJudge)
    }

    /// Create a mock that returns untranslated source text
    pub fn echo_verbatim() -> Self {
        Self::new(MockBehavior::EchoVerbatim)
    }

    /// Create a mock replying with a positional string array
    pub fn plain_strings() -> Self {
        Self::new(MockBehavior::PlainStrings)
    }

    /// Create a mock that always drops one translation
    pub fn drop_last_entry() -> Self {
        Self::new(MockBehavior::DropLastEntry)
    }

    /// Create a mock that always fails with an HTTP status
    pub fn fail_status(status: u16) -> Self {
        Self::new(MockBehavior::FailStatus { status })
    }

    /// Create a mock failing the first `failures` requests, then echoing
    pub fn fail_first(failures: usize, status: u16) -> Self {
        Self::new(MockBehavior::FailFirst { failures, status })
    }

    /// Number of requests issued so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copies of every request seen so far
    pub fn captured_requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn echo_translations(segments: &[Value], prefix: &str) -> String {
        let translations: Vec<Value> = segments
            .iter()
            .map(|segment| {
                let id = segment.get("id").cloned().unwrap_or(Value::Null);
                let text = segment.get("text").and_then(Value::as_str).unwrap_or_default();
                json!({"id": id, "text": format!("{prefix}{text}")})
            })
            .collect();
        json!({ "translations": translations }).to_string()
    }

    fn judge_decisions(items: &[Value], accept: bool) -> String {
        let decisions: Vec<Value> = items
            .iter()
            .map(|item| {
                let id = item.get("id").cloned().unwrap_or(Value::Null);
                json!({"id": id, "accept": accept, "reason": "mock decision"})
            })
            .collect();
        json!({ "decisions": decisions }).to_string()
    }
}

/// Extract the JSON envelope from a user message built by the engine.
fn extract_envelope(content: &str) -> Option<Value> {
    let marker = "INPUT JSON:\n";
    let start = content.find(marker)? + marker.len();
    let rest = &content[start..];
    let end = rest.find("\n\nReturn JSON only").unwrap_or(rest.len());
    serde_json::from_str(&rest[..end]).ok()
}

#[async_trait]
impl ChatProvider for MockProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let user_content = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let envelope = extract_envelope(user_content)
            .ok_or_else(|| ProviderError::ParseError("mock: no envelope in request".to_string()))?;

        // Judge requests carry items; translation requests carry segments
        if let Some(items) = envelope.get("items").and_then(Value::as_array) {
            let accept = self.behavior == MockBehavior::EchoAcceptingJudge;
            return Ok(Self::judge_decisions(items, accept));
        }

        let segments = envelope
            .get("segments")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        match self.behavior {
            MockBehavior::Echo | MockBehavior::EchoAcceptingJudge => {
                Ok(Self::echo_translations(&segments, ECHO_PREFIX))
            }
            MockBehavior::EchoVerbatim => Ok(Self::echo_translations(&segments, "")),
            MockBehavior::PlainStrings => {
                let translations: Vec<String> = segments
                    .iter()
                    .map(|segment| {
                        let text = segment.get("text").and_then(Value::as_str).unwrap_or_default();
                        format!("{ECHO_PREFIX}{text}")
                    })
                    .collect();
                Ok(json!({ "translations": translations }).to_string())
            }
            MockBehavior::DropLastEntry => {
                let kept = if segments.len() > 1 {
                    segments.len() - 1
                } else {
                    segments.len()
                };
                Ok(Self::echo_translations(&segments[..kept], ECHO_PREFIX))
            }
            MockBehavior::FailStatus { status } => Err(ProviderError::Api {
                status_code: status,
                message: "mock failure".to_string(),
                retry_after_ms: None,
            }),
            MockBehavior::FailFirst { failures, status } => {
                if count <= failures {
                    Err(ProviderError::Api {
                        status_code: status,
                        message: "mock transient failure".to_string(),
                        retry_after_ms: None,
                    })
                } else {
                    Ok(Self::echo_translations(&segments, ECHO_PREFIX))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ChatMessage;

    fn translation_request(ids: &[usize]) -> ChatRequest {
        let segments: Vec<Value> = ids
            .iter()
            .map(|id| json!({"id": id, "text": format!("text {id}")}))
            .collect();
        let payload = json!({
            "source_language": "English",
            "target_language": "Chinese",
            "glossary": [],
            "segments": segments
        });
        ChatRequest {
            model: "mock-model".to_string(),
            messages: vec![
                ChatMessage::system("prompt"),
                ChatMessage::user(format!(
                    "INPUT JSON:\n{}\n\nReturn JSON only with the exact shape: ...",
                    serde_json::to_string_pretty(&payload).unwrap()
                )),
            ],
            temperature: 0.0,
            max_tokens: 256,
        }
    }

    #[tokio::test]
    async fn test_mockProvider_echo_shouldPrefixEverySegment() {
        let provider = MockProvider::echo();
        let reply = provider.chat(&translation_request(&[0, 1])).await.unwrap();
        let parsed: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(parsed["translations"][0]["text"], "中译:text 0");
        assert_eq!(parsed["translations"][1]["id"], 1);
        assert_eq!(provider.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mockProvider_dropLastEntry_shouldOmitOne() {
        let provider = MockProvider::drop_last_entry();
        let reply = provider.chat(&translation_request(&[0, 1, 2])).await.unwrap();
        let parsed: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(parsed["translations"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mockProvider_failFirst_shouldRecoverAfterFailures() {
        let provider = MockProvider::fail_first(1, 503);
        let first = provider.chat(&translation_request(&[0])).await;
        assert!(matches!(
            first,
            Err(ProviderError::Api { status_code: 503, .. })
        ));
        let second = provider.chat(&translation_request(&[0])).await;
        assert!(second.is_ok());
    }
}
