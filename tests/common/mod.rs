/*!
 * Common test utilities for the md-translate test suite
 */

use std::collections::BTreeMap;
use std::sync::Arc;

use md_translate::app_config::Config;
use md_translate::event_log::EventLog;
use md_translate::providers::ChatProvider;
use md_translate::translation::TranslationEngine;
use md_translate::translation::prompts::{DEFAULT_JUDGE_PROMPT, DEFAULT_TRANSLATION_PROMPT};

/// A config tuned for tests: few retries, minimal backoff delays.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.translation.api_key = "test-key".to_string();
    config.translation.model = "test-model".to_string();
    config.translation.retry_times = 2;
    config.translation.temperature = 0.0;
    config.translation.timeout_ms = 1000;
    config.translation.retry_base_delay_ms = 0;
    config.translation.retry_max_delay_ms = 100;
    config
}

/// Build an engine over the given provider with an in-memory event log.
pub fn build_engine(
    provider: Arc<dyn ChatProvider>,
    config: &Config,
    glossary: &[(&str, &str)],
) -> (TranslationEngine, Arc<EventLog>) {
    let glossary_map: BTreeMap<String, String> = glossary
        .iter()
        .map(|(source, target)| (source.to_string(), target.to_string()))
        .collect();
    let events = Arc::new(EventLog::in_memory());
    let engine = TranslationEngine::new(
        provider,
        config,
        &glossary_map,
        DEFAULT_TRANSLATION_PROMPT,
        Some(DEFAULT_JUDGE_PROMPT),
        events.clone(),
    );
    (engine, events)
}

/// True when any recorded event has the given name.
pub fn has_event(events: &EventLog, name: &str) -> bool {
    events.entries().iter().any(|entry| entry["event"] == name)
}
