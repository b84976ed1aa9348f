/*!
 * Unit tests for the batch translation engine's retry state machine.
 */

use std::sync::Arc;
use std::sync::Mutex;

use md_translate::TranslationError;
use md_translate::errors::ProviderError;
use md_translate::providers::mock::MockProvider;
use md_translate::translation::{ProgressUpdate, TranslateOptions};

use crate::common::{build_engine, has_event, test_config};

#[tokio::test]
async fn test_engine_workingProvider_shouldTranslateAllSegments() {
    let provider = Arc::new(MockProvider::echo());
    let (engine, _) = build_engine(provider.clone(), &test_config(), &[]);

    let output = engine
        .translate_markdown("# Title\n\nHello world.\n", TranslateOptions::default())
        .await
        .unwrap();

    assert!(output.contains("中译:Title"));
    assert!(output.contains("中译:Hello world."));
    assert_eq!(provider.request_count(), 1);
}

#[tokio::test]
async fn test_engine_multiSegmentCountMismatch_shouldFallBackToSingletons() {
    let provider = Arc::new(MockProvider::drop_last_entry());
    let mut config = test_config();
    config.translation.retry_times = 2;
    let (engine, events) = build_engine(provider.clone(), &config, &[]);

    let output = engine
        .translate_markdown("First paragraph.\n\nSecond paragraph.\n", TranslateOptions::default())
        .await
        .unwrap();

    assert!(output.contains("中译:First paragraph."));
    assert!(output.contains("中译:Second paragraph."));
    // Two failed batch attempts, then one request per segment
    assert_eq!(provider.request_count(), 4);
    assert!(has_event(&events, "translation_count_mismatch"));
    assert!(has_event(&events, "batch_singleton_fallback"));
}

#[tokio::test]
async fn test_engine_nonRetryableStatus_shouldAbortWithoutRetrying() {
    let provider = Arc::new(MockProvider::fail_status(404));
    let (engine, events) = build_engine(provider.clone(), &test_config(), &[]);

    let error = engine
        .translate_markdown("Some content here.\n", TranslateOptions::default())
        .await
        .unwrap_err();

    match error {
        TranslationError::Provider(ProviderError::Api { status_code, .. }) => {
            assert_eq!(status_code, 404);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(provider.request_count(), 1);
    assert!(has_event(&events, "non_retryable_error"));
}

#[tokio::test]
async fn test_engine_transientServerError_shouldRetryAndSucceed() {
    let provider = Arc::new(MockProvider::fail_first(1, 503));
    let mut config = test_config();
    config.translation.retry_times = 3;
    let (engine, events) = build_engine(provider.clone(), &config, &[]);

    let output = engine
        .translate_markdown("Recovered after one failure.\n", TranslateOptions::default())
        .await
        .unwrap();

    assert!(output.contains("中译:Recovered after one failure."));
    assert_eq!(provider.request_count(), 2);
    assert!(has_event(&events, "translation_attempt_failed"));
}

#[tokio::test]
async fn test_engine_exhaustedFailures_shouldReportBatchFailed() {
    let provider = Arc::new(MockProvider::fail_status(500));
    let mut config = test_config();
    config.translation.retry_times = 2;
    let (engine, events) = build_engine(provider.clone(), &config, &[]);

    let error = engine
        .translate_markdown("Never succeeds here.\n", TranslateOptions::default())
        .await
        .unwrap_err();

    match error {
        TranslationError::BatchFailed { attempts, pending, .. } => {
            assert_eq!(attempts, 2);
            assert_eq!(pending, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(provider.request_count(), 2);
    assert!(has_event(&events, "translation_batch_failed"));
}

#[tokio::test]
async fn test_engine_untranslatedEcho_shouldFailAfterRetries() {
    let provider = Arc::new(MockProvider::echo_verbatim());
    let (engine, events) = build_engine(provider.clone(), &test_config(), &[]);

    let error = engine
        .translate_markdown(
            "This is a long enough sentence to trigger the heuristic check for sure.\n",
            TranslateOptions::default(),
        )
        .await
        .unwrap_err();

    match error {
        TranslationError::UntranslatedAfterRetries { segment_ids } => {
            assert_eq!(segment_ids, vec![0]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(provider.request_count(), 2);
    assert!(has_event(&events, "untranslated_segments_detected"));
    assert!(has_event(&events, "untranslated_segments_after_retries"));
}

#[tokio::test]
async fn test_engine_shortLabelEcho_shouldNotTriggerDetector() {
    // Short labels are exempt from the untranslated heuristic
    let provider = Arc::new(MockProvider::echo_verbatim());
    let (engine, _) = build_engine(provider.clone(), &test_config(), &[]);

    let output = engine
        .translate_markdown("# Install\n", TranslateOptions::default())
        .await
        .unwrap();

    assert!(output.contains("Install"));
    assert_eq!(provider.request_count(), 1);
}

#[tokio::test]
async fn test_engine_glossaryMissWithRejectingJudge_shouldSalvageWithWarning() {
    let provider = Arc::new(MockProvider::echo());
    let (engine, events) = build_engine(provider.clone(), &test_config(), &[("API", "接口")]);

    let output = engine
        .translate_markdown("Use the API.\n", TranslateOptions::default())
        .await
        .unwrap();

    // The echo never produces the mandated target term and the judge
    // rejects, so the last translation ships with a logged warning
    assert!(output.contains("中译:Use the API."));
    // retry_times=2: two translation attempts, each followed by a judge call
    assert_eq!(provider.request_count(), 4);
    assert!(has_event(&events, "glossary_check_failed_after_retries"));
}

#[tokio::test]
async fn test_engine_glossaryMissWithAcceptingJudge_shouldResolveImmediately() {
    let provider = Arc::new(MockProvider::echo_accepting_judge());
    let (engine, events) = build_engine(provider.clone(), &test_config(), &[("API", "接口")]);

    let output = engine
        .translate_markdown("Use the API.\n", TranslateOptions::default())
        .await
        .unwrap();

    assert!(output.contains("中译:Use the API."));
    // One translation request plus one judge request
    assert_eq!(provider.request_count(), 2);
    assert!(!has_event(&events, "glossary_check_failed_after_retries"));
}

#[tokio::test]
async fn test_engine_progress_shouldAdvancePerBatchInOrder() {
    let provider = Arc::new(MockProvider::echo());
    let mut config = test_config();
    config.translation.max_batch_segments = 1;
    let (engine, _) = build_engine(provider.clone(), &config, &[]);

    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();
    let on_progress = move |update: ProgressUpdate| {
        sink.lock().unwrap().push(update);
    };

    engine
        .translate_markdown(
            "One.\n\nTwo.\n\nThree.\n",
            TranslateOptions {
                translate_markdown_code_blocks: false,
                on_progress: Some(&on_progress),
            },
        )
        .await
        .unwrap();

    let recorded = updates.lock().unwrap().clone();
    assert_eq!(
        recorded,
        vec![
            ProgressUpdate { done: 0, total: 3 },
            ProgressUpdate { done: 1, total: 3 },
            ProgressUpdate { done: 2, total: 3 },
            ProgressUpdate { done: 3, total: 3 },
        ]
    );
    assert_eq!(provider.request_count(), 3);
}

#[tokio::test]
async fn test_engine_emptyDocument_shouldShortCircuit() {
    let provider = Arc::new(MockProvider::echo());
    let (engine, _) = build_engine(provider.clone(), &test_config(), &[]);

    let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = updates.clone();
    let on_progress = move |update: ProgressUpdate| {
        sink.lock().unwrap().push(update);
    };

    let output = engine
        .translate_markdown(
            "",
            TranslateOptions {
                translate_markdown_code_blocks: false,
                on_progress: Some(&on_progress),
            },
        )
        .await
        .unwrap();

    assert_eq!(output, "");
    assert_eq!(provider.request_count(), 0);
    assert_eq!(
        updates.lock().unwrap().clone(),
        vec![ProgressUpdate { done: 1, total: 1 }]
    );
}

#[tokio::test]
async fn test_engine_batchRequests_shouldCarryOnlyMatchedGlossaryTerms() {
    // "cache" maps to itself, so the echoed translation satisfies the check
    let provider = Arc::new(MockProvider::echo());
    let (engine, _) = build_engine(
        provider.clone(),
        &test_config(),
        &[("API", "接口"), ("cache", "cache")],
    );

    engine
        .translate_markdown("The cache is warm.\n", TranslateOptions::default())
        .await
        .unwrap();

    let requests = provider.captured_requests();
    assert_eq!(requests.len(), 1);
    let user_message = &requests[0].messages[1].content;
    assert!(user_message.contains("\"cache\""));
    assert!(!user_message.contains("\"API\""));
}
