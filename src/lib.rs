/*!
 * # md-translate
 *
 * A Rust library for translating markdown documents between natural
 * languages using LLM completion services.
 *
 * ## Features
 *
 * - Extract translatable text from markdown while preserving structure
 *   (code blocks, inline code, raw HTML, frontmatter and math are never
 *   touched)
 * - Group segments into size-bounded batches (characters, estimated tokens,
 *   segment count)
 * - Enforce a terminology glossary, with a secondary judge model arbitrating
 *   borderline misses
 * - Detect and retry untranslated output, malformed replies, and transient
 *   network/HTTP failures with classified backoff
 * - Optionally recurse into fenced code blocks that contain markdown
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `markdown_processor`: Markdown parsing, segment extraction and
 *   re-serialization
 * - `translation`: the segment-batching pipeline:
 *   - `translation::engine`: the batch translation engine
 *   - `translation::batch`: batch planning
 *   - `translation::response`: tolerant model-reply normalization
 *   - `translation::retry`: failure classification and backoff
 *   - `translation::glossary`: terminology matching and judge decisions
 *   - `translation::detect`: untranslated-output heuristics
 * - `providers`: Client implementations for completion services
 * - `event_log`: Structured JSONL event logging
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod event_log;
pub mod file_utils;
pub mod language_utils;
pub mod markdown_processor;
pub mod providers;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, ProviderError, TranslationError};
pub use markdown_processor::{MarkdownDocument, Segment};
pub use translation::{ProgressUpdate, TranslateOptions, TranslationEngine};
