/*!
 * The batch translation engine.
 *
 * Orchestrates the end-to-end pipeline for one document: extract segments,
 * plan batches, issue completion requests, enforce the glossary (with judge
 * arbitration), detect untranslated echoes, retry with backoff, and write
 * the results back into the tree.
 *
 * Batches are processed strictly in document order with a single outstanding
 * remote call, so output is deterministic regardless of network timing. Each
 * batch runs a pending-set loop: segments that come back with missing
 * glossary terms or untranslated-looking text stay pending and are re-sent
 * with the unmet terms as extra context, until the set drains, a terminal
 * failure occurs, or the attempt ceiling is reached.
 */

use log::warn;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::app_config::{Config, TranslationConfig};
use crate::errors::TranslationError;
use crate::event_log::EventLog;
use crate::language_utils;
use crate::markdown_processor::{self, MarkdownDocument, Segment};
use crate::providers::{ChatMessage, ChatProvider, ChatRequest};
use crate::translation::batch::{BatchLimits, plan_batches};
use crate::translation::detect;
use crate::translation::estimate;
use crate::translation::glossary::{self, GlossaryEntry, JudgeDecision};
use crate::translation::prompts::{
    self, JudgeEnvelope, JudgeItem, SegmentItem, TermPair, TranslationEnvelope,
};
use crate::translation::response;
use crate::translation::retry::{BackoffPolicy, RetryCategory, retry_after_hint};

/// One progress notification: resolved segments out of the non-empty total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressUpdate {
    /// Segments with an accepted translation so far
    pub done: usize,
    /// Total non-empty segments in the document
    pub total: usize,
}

/// Progress callback type. `total == 0` or `done >= total` signals completion.
pub type ProgressFn = dyn Fn(ProgressUpdate) + Send + Sync;

/// Per-call options for a document translation.
#[derive(Default)]
pub struct TranslateOptions<'a> {
    /// Recurse into fenced blocks that contain markdown
    pub translate_markdown_code_blocks: bool,
    /// Progress sink; only the top-level document reports
    pub on_progress: Option<&'a ProgressFn>,
}

/// The batch translation engine.
pub struct TranslationEngine {
    provider: Arc<dyn ChatProvider>,
    config: TranslationConfig,
    glossary: Vec<GlossaryEntry>,
    system_prompt: String,
    judge_prompt: Option<String>,
    source_language: String,
    target_language: String,
    backoff: BackoffPolicy,
    events: Arc<EventLog>,
}

fn report(progress: Option<&ProgressFn>, done: usize, total: usize) {
    if let Some(callback) = progress {
        callback(ProgressUpdate { done, total });
    }
}

/// Batch-level failures that are retried as single-segment batches.
fn is_sweepable(error: &TranslationError) -> bool {
    matches!(
        error,
        TranslationError::CountMismatch { .. }
            | TranslationError::BatchFailed { .. }
            | TranslationError::UntranslatedAfterRetries { .. }
    )
}

/// First few ids for log lines, with an overflow marker.
fn format_ids(ids: &[usize]) -> String {
    let mut out = ids
        .iter()
        .take(5)
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if ids.len() > 5 {
        out.push_str(&format!(" ... +{}", ids.len() - 5));
    }
    out
}

impl TranslationEngine {
    /// Create an engine from configuration.
    ///
    /// Language codes are resolved to display names for the request
    /// envelopes; unknown codes are passed through as-is.
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        config: &Config,
        glossary_map: &BTreeMap<String, String>,
        translation_prompt: &str,
        judge_prompt: Option<&str>,
        events: Arc<EventLog>,
    ) -> Self {
        let source_language = language_utils::get_language_name(&config.source_language)
            .unwrap_or_else(|_| config.source_language.clone());
        let target_language = language_utils::get_language_name(&config.target_language)
            .unwrap_or_else(|_| config.target_language.clone());
        let system_prompt =
            prompts::render_system_prompt(translation_prompt, &source_language, &target_language);

        Self {
            provider,
            glossary: glossary::build_entries(glossary_map),
            system_prompt,
            judge_prompt: judge_prompt.map(str::to_string),
            source_language,
            target_language,
            backoff: BackoffPolicy {
                base_delay_ms: config.translation.retry_base_delay_ms,
                max_delay_ms: config.translation.retry_max_delay_ms,
            },
            config: config.translation.clone(),
            events,
        }
    }

    /// Translate a markdown document, returning the re-serialized output.
    ///
    /// Either the whole document translates or an error is returned; partial
    /// documents are never produced.
    pub async fn translate_markdown(
        &self,
        source: &str,
        options: TranslateOptions<'_>,
    ) -> Result<String, TranslationError> {
        self.translate_document(
            source,
            options.on_progress,
            options.translate_markdown_code_blocks,
        )
        .await
    }

    /// Recursive worker behind [`translate_markdown`].
    ///
    /// Nested invocations (markdown inside fenced blocks) run the same
    /// pipeline with progress reporting suppressed.
    fn translate_document<'a>(
        &'a self,
        source: &'a str,
        progress: Option<&'a ProgressFn>,
        translate_code_blocks: bool,
    ) -> Pin<Box<dyn Future<Output = Result<String, TranslationError>> + Send + 'a>> {
        Box::pin(async move {
            let mut document = MarkdownDocument::parse(source);
            let segments = document.collect_segments();

            if segments.is_empty()
                && (!translate_code_blocks || document.markdown_code_blocks().is_empty())
            {
                report(progress, 1, 1);
                return Ok(source.to_string());
            }

            let segment_terms: Vec<Vec<usize>> = segments
                .iter()
                .map(|segment| glossary::term_indices(&segment.text, &self.glossary))
                .collect();

            let mut translations: Vec<Option<String>> = vec![None; segments.len()];
            let mut indices = Vec::new();
            for segment in &segments {
                if segment.text.trim().is_empty() {
                    // Whitespace-only leaves resolve to themselves, unbatched
                    translations[segment.id] = Some(segment.text.clone());
                } else {
                    indices.push(segment.id);
                }
            }

            let total = indices.len();
            if total == 0 {
                report(progress, 1, 1);
            } else {
                report(progress, 0, total);
            }

            let base_tokens =
                estimate::estimate_base_tokens(&self.system_prompt, &self.envelope_scaffold());
            let limits = BatchLimits {
                max_chars: self.config.effective_max_batch_chars(),
                max_tokens: self.config.max_batch_tokens,
                max_segments: self.config.max_batch_segments,
                base_tokens,
            };
            let batches = plan_batches(&indices, &segments, &limits);

            let mut done = 0usize;
            for batch in &batches {
                match self
                    .translate_batch_with_retries(batch, &segments, &segment_terms, &mut translations)
                    .await
                {
                    Ok(()) => {
                        done += batch.len();
                        report(progress, done, total);
                    }
                    Err(error) if batch.len() > 1 && is_sweepable(&error) => {
                        warn!(
                            "Batch translation failed ({error}); retrying with single-segment batches"
                        );
                        self.events.warn(
                            "batch_singleton_fallback",
                            json!({ "batch_size": batch.len(), "error": error.to_string() }),
                        );
                        for &id in batch {
                            self.translate_batch_with_retries(
                                &[id],
                                &segments,
                                &segment_terms,
                                &mut translations,
                            )
                            .await?;
                            done += 1;
                            report(progress, done, total);
                        }
                    }
                    Err(error) => return Err(error),
                }
            }

            for segment in &segments {
                if let Some(value) = translations[segment.id].take() {
                    document.set_segment_text(segment, value);
                }
            }

            if translate_code_blocks {
                let slots = document.markdown_code_blocks();
                // Reverse order keeps earlier event ranges valid while splicing
                for slot in slots.iter().rev() {
                    let translated = self
                        .translate_document(&slot.content, None, translate_code_blocks)
                        .await?;
                    let normalized =
                        markdown_processor::normalize_trailing_newline(translated, &slot.content);
                    document.replace_code_block_content(slot, normalized);
                }
            }

            document.render()
        })
    }

    /// Run the pending-set loop for one batch.
    ///
    /// On return, every id of the batch has a translation in `translations`
    /// (possibly with a logged glossary warning); errors mean the batch
    /// produced no acceptable result and the caller decides about fallback.
    async fn translate_batch_with_retries(
        &self,
        batch: &[usize],
        segments: &[Segment],
        segment_terms: &[Vec<usize>],
        translations: &mut [Option<String>],
    ) -> Result<(), TranslationError> {
        let mut pending: Vec<usize> = batch.to_vec();
        let mut missing_entries: Vec<usize> = Vec::new();
        let mut attempt: u32 = 0;
        let mut had_success = false;

        while !pending.is_empty() && attempt < self.config.retry_times {
            attempt += 1;

            let items: Vec<SegmentItem> = pending
                .iter()
                .map(|&id| SegmentItem {
                    id,
                    text: segments[id].text.clone(),
                })
                .collect();
            let per_segment: Vec<&[usize]> = pending
                .iter()
                .map(|&id| segment_terms[id].as_slice())
                .collect();
            let batch_glossary = glossary::union_indices(&per_segment);

            match self
                .request_translations(&items, &batch_glossary, &missing_entries)
                .await
            {
                Ok(values) => {
                    had_success = true;
                    for (pos, &id) in pending.iter().enumerate() {
                        translations[id] = Some(values[pos].clone());
                    }

                    let mut missing_map =
                        glossary::check_glossary(&pending, segment_terms, &values, &self.glossary);

                    let untranslated: Vec<usize> = pending
                        .iter()
                        .enumerate()
                        .filter(|&(pos, &id)| {
                            detect::is_likely_untranslated(&segments[id].text, &values[pos])
                        })
                        .map(|(_, &id)| id)
                        .collect();
                    if !untranslated.is_empty() {
                        warn!(
                            "Detected untranslated segments; retrying. Segment ids: {}",
                            format_ids(&untranslated)
                        );
                        self.events.warn(
                            "untranslated_segments_detected",
                            json!({ "count": untranslated.len(), "segment_ids": &untranslated }),
                        );
                    }

                    if !missing_map.is_empty() {
                        if let Some(judge_prompt) = self.judge_prompt.as_deref() {
                            match self
                                .judge_missing(judge_prompt, &missing_map, segments, translations)
                                .await
                            {
                                Ok(decisions) => {
                                    for (id, decision) in decisions {
                                        if decision.accept {
                                            missing_map.remove(&id);
                                        }
                                    }
                                }
                                Err(error) => {
                                    // Judge failures never fail the pipeline;
                                    // the segment just stays pending
                                    warn!("Glossary judge failed; continuing with retries: {error}");
                                    self.events.warn(
                                        "glossary_judge_failed",
                                        json!({ "error": error.to_string() }),
                                    );
                                }
                            }
                        }
                    }

                    let mut unresolved: BTreeSet<usize> = missing_map.keys().copied().collect();
                    unresolved.extend(untranslated.iter().copied());
                    if unresolved.is_empty() {
                        pending.clear();
                        break;
                    }

                    missing_entries = glossary::flatten_missing(&missing_map);
                    pending = unresolved.into_iter().collect();

                    if missing_entries.is_empty() {
                        warn!("Retrying unresolved untranslated segments.");
                    } else {
                        warn!(
                            "Glossary check failed; retrying. Missing terms: {}",
                            self.format_terms(&missing_entries)
                        );
                    }
                }
                Err(error) => {
                    let category = RetryCategory::classify(&error);
                    let exhausted = attempt >= self.config.retry_times;

                    if category.is_retryable() && !exhausted {
                        let delay =
                            self.backoff
                                .delay_for(category, attempt, retry_after_hint(&error));
                        warn!(
                            "Translation attempt {attempt} failed ({}); retrying in {delay:?}: {error}",
                            category.as_str()
                        );
                        self.events.warn(
                            "translation_attempt_failed",
                            json!({
                                "attempt": attempt,
                                "category": category.as_str(),
                                "delay_ms": delay.as_millis() as u64,
                                "error": error.to_string(),
                            }),
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    // A count mismatch that survives to the last attempt of a
                    // multi-segment batch escalates so the caller can retry
                    // the ids as singletons instead of salvaging blindly
                    if exhausted
                        && batch.len() > 1
                        && matches!(error, TranslationError::CountMismatch { .. })
                    {
                        return Err(error);
                    }

                    if !had_success {
                        if !category.is_retryable() {
                            self.events.error(
                                "non_retryable_error",
                                json!({
                                    "category": category.as_str(),
                                    "error": error.to_string(),
                                }),
                            );
                            return Err(error);
                        }
                        let failed = TranslationError::BatchFailed {
                            attempts: self.config.retry_times,
                            pending: pending.len(),
                            reason: error.to_string(),
                        };
                        self.events.error(
                            "translation_batch_failed",
                            json!({
                                "attempts": self.config.retry_times,
                                "pending": pending.len(),
                                "error": error.to_string(),
                            }),
                        );
                        return Err(failed);
                    }

                    // Salvage: keep the last successful partial result and
                    // abandon whatever is still pending
                    if exhausted {
                        warn!("Translation retries exhausted; using last available translations.");
                        self.events.warn(
                            "translation_retries_exhausted",
                            json!({ "pending": pending.len(), "error": error.to_string() }),
                        );
                    } else {
                        warn!(
                            "Non-retryable failure after a successful attempt; abandoning {} pending segments.",
                            pending.len()
                        );
                        self.events.error(
                            "non_retryable_error",
                            json!({
                                "category": category.as_str(),
                                "error": error.to_string(),
                                "abandoned": pending.len(),
                            }),
                        );
                    }
                    pending.clear();
                    break;
                }
            }
        }

        if !pending.is_empty() {
            // The loop ran out of attempts while glossary terms or
            // untranslated output were still unresolved
            let untranslated: Vec<usize> = pending
                .iter()
                .copied()
                .filter(|&id| {
                    let translated = translations[id].as_deref().unwrap_or("");
                    detect::is_likely_untranslated(&segments[id].text, translated)
                })
                .collect();
            if !untranslated.is_empty() {
                self.events.error(
                    "untranslated_segments_after_retries",
                    json!({ "segment_ids": &untranslated }),
                );
                return Err(TranslationError::UntranslatedAfterRetries {
                    segment_ids: untranslated,
                });
            }

            warn!(
                "Glossary check failed after retries; using last available translations. Missing terms: {}",
                self.format_terms(&missing_entries)
            );
            self.events.warn(
                "glossary_check_failed_after_retries",
                json!({
                    "missing_terms": missing_entries
                        .iter()
                        .map(|&i| json!({
                            "source": self.glossary[i].source,
                            "target": self.glossary[i].target,
                        }))
                        .collect::<Vec<_>>(),
                }),
            );
        }

        Ok(())
    }

    /// Issue one translation request and normalize the reply.
    async fn request_translations(
        &self,
        items: &[SegmentItem],
        batch_glossary: &[usize],
        missing_entries: &[usize],
    ) -> Result<Vec<String>, TranslationError> {
        let envelope = TranslationEnvelope {
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
            glossary: self.term_pairs(batch_glossary),
            segments: items.to_vec(),
            missing_terms: if missing_entries.is_empty() {
                None
            } else {
                Some(self.term_pairs(missing_entries))
            },
        };
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::system(self.system_prompt.trim()),
                ChatMessage::user(prompts::build_translation_message(&envelope)),
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let content = match self.provider.chat(&request).await {
            Ok(content) => content,
            Err(error) => {
                self.events.error(
                    "chat_completion_failed",
                    json!({ "type": "translation", "error": error.to_string() }),
                );
                return Err(TranslationError::Provider(error));
            }
        };

        let parsed = match response::parse_model_response(&content) {
            Ok(parsed) => parsed,
            Err(error) => {
                self.events.error(
                    "parse_translation_response_failed",
                    json!({
                        "type": "translation",
                        "error": error.to_string(),
                        "response": content,
                    }),
                );
                return Err(error);
            }
        };

        let expected_ids: Vec<usize> = items.iter().map(|item| item.id).collect();
        match response::normalize_translations(&parsed, &expected_ids) {
            Ok(values) => Ok(values),
            Err(error) => {
                if let TranslationError::CountMismatch {
                    expected,
                    actual,
                    missing_ids,
                } = &error
                {
                    self.events.error(
                        "translation_count_mismatch",
                        json!({
                            "expected": expected,
                            "actual": actual,
                            "missing_ids": missing_ids,
                            "response": content,
                        }),
                    );
                }
                Err(error)
            }
        }
    }

    /// Ask the judge model to arbitrate glossary misses.
    async fn judge_missing(
        &self,
        judge_prompt: &str,
        missing_map: &BTreeMap<usize, Vec<usize>>,
        segments: &[Segment],
        translations: &[Option<String>],
    ) -> Result<HashMap<usize, JudgeDecision>, TranslationError> {
        let items: Vec<JudgeItem> = missing_map
            .iter()
            .map(|(&id, entry_indices)| JudgeItem {
                id,
                source: segments[id].text.clone(),
                translation: translations[id].clone().unwrap_or_default(),
                missing_terms: self.term_pairs(entry_indices),
            })
            .collect();
        let envelope = JudgeEnvelope { items };
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::system(judge_prompt.trim()),
                ChatMessage::user(prompts::build_judge_message(&envelope)),
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let content = match self.provider.chat(&request).await {
            Ok(content) => content,
            Err(error) => {
                self.events.error(
                    "chat_completion_failed",
                    json!({ "type": "glossary_judge", "error": error.to_string() }),
                );
                return Err(TranslationError::Provider(error));
            }
        };

        let parsed = match response::parse_model_response(&content) {
            Ok(parsed) => parsed,
            Err(error) => {
                self.events.error(
                    "parse_judge_response_failed",
                    json!({
                        "type": "glossary_judge",
                        "error": error.to_string(),
                        "response": content,
                    }),
                );
                return Err(error);
            }
        };

        glossary::parse_judge_decisions(&parsed)
    }

    /// The envelope scaffolding of a request with no segments; its token
    /// cost is the fixed per-request overhead used for batch budgeting.
    fn envelope_scaffold(&self) -> String {
        let envelope = TranslationEnvelope {
            source_language: self.source_language.clone(),
            target_language: self.target_language.clone(),
            glossary: self.term_pairs(&(0..self.glossary.len()).collect::<Vec<_>>()),
            segments: Vec::new(),
            missing_terms: None,
        };
        prompts::build_translation_message(&envelope)
    }

    fn term_pairs(&self, entry_indices: &[usize]) -> Vec<TermPair> {
        entry_indices
            .iter()
            .map(|&i| TermPair {
                source: self.glossary[i].source.clone(),
                target: self.glossary[i].target.clone(),
            })
            .collect()
    }

    fn format_terms(&self, entry_indices: &[usize]) -> String {
        entry_indices
            .iter()
            .map(|&i| format!("{} -> {}", self.glossary[i].source, self.glossary[i].target))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
