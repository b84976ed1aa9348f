/*!
 * Segment-batching translation pipeline.
 *
 * This module contains the core of the translator. It is split into several
 * submodules:
 *
 * - `engine`: the batch translation engine driving the whole pipeline
 * - `batch`: batch planning under char/token/count limits
 * - `estimate`: token cost estimation
 * - `response`: tolerant model-reply parsing and alignment
 * - `glossary`: terminology matching, enforcement and judge decisions
 * - `detect`: untranslated-output heuristics
 * - `retry`: failure classification and backoff
 * - `prompts`: prompt templates and request envelopes
 */

// Re-export main types for easier usage
pub use self::engine::{ProgressFn, ProgressUpdate, TranslateOptions, TranslationEngine};
pub use self::retry::{BackoffPolicy, RetryCategory};

// Submodules
pub mod batch;
pub mod detect;
pub mod engine;
pub mod estimate;
pub mod glossary;
pub mod prompts;
pub mod response;
pub mod retry;
