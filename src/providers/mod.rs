/*!
 * Provider implementations for chat completion services.
 *
 * This module contains the client interface the translation engine talks
 * to, plus the concrete implementations:
 * - OpenAI: any OpenAI-compatible chat completions endpoint
 * - Mock: scriptable in-memory provider for tests
 */

use async_trait::async_trait;

use crate::errors::ProviderError;

/// A single chat message.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatMessage {
    /// Role of the message sender (system or user)
    pub role: String,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages, system first
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token ceiling
    pub max_tokens: u32,
}

/// Common trait for chat completion providers.
///
/// The engine issues one request at a time and only needs the reply text;
/// transport, authentication and timeout handling live behind this trait.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send a chat request and return the completion content.
    async fn chat(&self, request: &ChatRequest) -> Result<String, ProviderError>;
}

pub mod mock;
pub mod openai;
