use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and merging configuration settings from file and environment.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Inline glossary entries (source term -> target term)
    #[serde(default)]
    pub glossary: BTreeMap<String, String>,

    /// Optional glossary file path, merged under inline entries
    #[serde(default)]
    pub glossary_path: Option<String>,

    /// Optional system prompt file for translation requests
    #[serde(default)]
    pub prompt_path: Option<String>,

    /// Optional system prompt file for glossary judge requests
    #[serde(default)]
    pub judge_prompt_path: Option<String>,

    /// Optional structured event log path (JSON lines)
    #[serde(default)]
    pub log_path: Option<String>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key; may also come from the environment
    #[serde(default)]
    pub api_key: String,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Attempt ceiling per batch
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token ceiling per request
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum combined characters per batch; derived from the token limit
    /// when unset
    #[serde(default)]
    pub max_batch_chars: Option<usize>,

    /// Maximum estimated tokens per batch
    #[serde(default = "default_max_batch_tokens")]
    pub max_batch_tokens: usize,

    /// Maximum segments per batch
    #[serde(default = "default_max_batch_segments")]
    pub max_batch_segments: usize,

    /// Base retry delay in milliseconds
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Retry delay ceiling in milliseconds
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Recurse into fenced code blocks containing markdown
    #[serde(default)]
    pub translate_markdown_code_blocks: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
            model: default_model(),
            retry_times: default_retry_times(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_timeout_ms(),
            max_batch_chars: None,
            max_batch_tokens: default_max_batch_tokens(),
            max_batch_segments: default_max_batch_segments(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            translate_markdown_code_blocks: false,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "zh".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_retry_times() -> u32 {
    3
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_timeout_ms() -> u64 {
    120_000
}

fn default_max_batch_tokens() -> usize {
    3000
}

fn default_max_batch_segments() -> usize {
    100
}

fn default_retry_base_delay_ms() -> u64 {
    500 // doubled per attempt, twice that for rate limits
}

fn default_retry_max_delay_ms() -> u64 {
    8000
}

/// Characters assumed per token when deriving the char limit.
const BATCH_CHARS_PER_TOKEN: usize = 8;
/// Lower bound of the derived char limit.
const MIN_BATCH_CHARS: usize = 4000;

impl TranslationConfig {
    /// The character limit actually used for batching: the configured value,
    /// or one derived from the token limit.
    pub fn effective_max_batch_chars(&self) -> usize {
        match self.max_batch_chars {
            Some(chars) => chars,
            None => MIN_BATCH_CHARS.max(self.max_batch_tokens * BATCH_CHARS_PER_TOKEN),
        }
    }
}

impl Config {
    /// Load a configuration file (JSON).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open config file: {}", path.display()))?;
        let reader = std::io::BufReader::new(file);
        let config: Config = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Apply environment overrides: `OPENAI_BASE_URL` replaces the base URL,
    /// `OPENAI_API_KEY` fills the API key when the config has none.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(base_url) = std::env::var("OPENAI_BASE_URL") {
            if !base_url.trim().is_empty() {
                self.translation.base_url = base_url;
            }
        }
        if self.translation.api_key.is_empty() {
            if let Ok(api_key) = std::env::var("OPENAI_API_KEY") {
                self.translation.api_key = api_key;
            }
        }
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.source_language.trim().is_empty() {
            return Err(anyhow!("source_language must not be empty"));
        }
        if self.target_language.trim().is_empty() {
            return Err(anyhow!("target_language must not be empty"));
        }

        let t = &self.translation;
        if t.base_url.trim().is_empty() {
            return Err(anyhow!("base_url must not be empty"));
        }
        url::Url::parse(&t.base_url)
            .map_err(|e| anyhow!("base_url is not a valid URL: {}", e))?;
        if t.model.trim().is_empty() {
            return Err(anyhow!("model must not be empty"));
        }
        if !(1..=20).contains(&t.retry_times) {
            return Err(anyhow!("retry_times must be between 1 and 20, got {}", t.retry_times));
        }
        if !(0.0..=2.0).contains(&t.temperature) {
            return Err(anyhow!("temperature must be between 0 and 2, got {}", t.temperature));
        }
        if t.max_tokens == 0 {
            return Err(anyhow!("max_tokens must be at least 1"));
        }
        if t.timeout_ms < 1000 {
            return Err(anyhow!("timeout_ms must be at least 1000, got {}", t.timeout_ms));
        }
        if t.max_batch_tokens < 128 {
            return Err(anyhow!("max_batch_tokens must be at least 128, got {}", t.max_batch_tokens));
        }
        if let Some(chars) = t.max_batch_chars {
            if chars == 0 {
                return Err(anyhow!("max_batch_chars must be at least 1"));
            }
        }
        if t.max_batch_segments == 0 {
            return Err(anyhow!("max_batch_segments must be at least 1"));
        }
        if t.retry_base_delay_ms > 60_000 {
            return Err(anyhow!(
                "retry_base_delay_ms must be at most 60000, got {}",
                t.retry_base_delay_ms
            ));
        }
        if !(100..=120_000).contains(&t.retry_max_delay_ms) {
            return Err(anyhow!(
                "retry_max_delay_ms must be between 100 and 120000, got {}",
                t.retry_max_delay_ms
            ));
        }
        if t.retry_max_delay_ms < t.retry_base_delay_ms {
            return Err(anyhow!(
                "retry_max_delay_ms must be greater than or equal to retry_base_delay_ms"
            ));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            glossary: BTreeMap::new(),
            glossary_path: None,
            prompt_path: None,
            judge_prompt_path: None,
            log_path: None,
            log_level: LogLevel::default(),
        }
    }
}
