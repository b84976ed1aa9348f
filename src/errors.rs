/*!
 * Error types for the md-translate application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

// Allow dead code - error types are for library consumers
#![allow(dead_code)]

use thiserror::Error;

/// Errors that can occur when talking to a completion provider
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when sending an API request fails at the transport level
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when the request exceeded its deadline
    #[error("request timed out after {timeout_ms} ms")]
    Timeout {
        /// Configured timeout in milliseconds
        timeout_ms: u64,
    },

    /// Error returned by the API itself
    #[error("API error {status_code}: {message}")]
    Api {
        /// HTTP status code
        status_code: u16,
        /// Error body from the API (truncated)
        message: String,
        /// Server-supplied Retry-After hint, in milliseconds
        retry_after_ms: Option<u64>,
    },

    /// The API answered but the completion content was empty
    #[error("empty response content from API")]
    EmptyResponse,

    /// Error when decoding the API response envelope fails
    #[error("failed to parse API response: {0}")]
    ParseError(String),
}

/// Errors that can occur during translation
#[derive(Error, Debug)]
pub enum TranslationError {
    /// The model returned a different number of translations than requested
    #[error("model returned incorrect number of translations (expected {expected}, actual {actual})")]
    CountMismatch {
        /// Number of segments sent in the request
        expected: usize,
        /// Number of usable translations in the reply
        actual: usize,
        /// Requested ids with no matching reply item
        missing_ids: Vec<usize>,
    },

    /// All attempts for a batch were exhausted without a usable result
    #[error("translation failed for {pending} segments after {attempts} attempts: {reason}")]
    BatchFailed {
        /// Attempts made before giving up
        attempts: u32,
        /// Segments still unresolved
        pending: usize,
        /// Message of the final failure
        reason: String,
    },

    /// No JSON object could be extracted from the model reply
    #[error("failed to parse JSON from model response: {0}")]
    ParseFailure(String),

    /// Output for these segments still looks like untranslated source text
    #[error("segments remained untranslated after all retries: {segment_ids:?}")]
    UntranslatedAfterRetries {
        /// Ids of the segments the detector still flags
        segment_ids: Vec<usize>,
    },

    /// Error from the completion provider
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error while serializing the translated document back to markdown
    #[error("failed to render markdown output: {0}")]
    Render(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error in the configuration
    #[error("Config error: {0}")]
    Config(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from translation
    #[error("Translation error: {0}")]
    Translation(#[from] TranslationError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
