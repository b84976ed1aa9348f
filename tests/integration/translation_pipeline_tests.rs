/*!
 * End-to-end pipeline tests: markdown in, translated markdown out.
 */

use std::sync::Arc;

use md_translate::providers::mock::MockProvider;
use md_translate::translation::TranslateOptions;

use crate::common::{build_engine, test_config};

const MIXED_DOCUMENT: &str = "# T\n\nHello world.\n\n```js\nconst x=1;\n```\n";

#[tokio::test]
async fn test_pipeline_codeFences_shouldSurviveUntouched() {
    let provider = Arc::new(MockProvider::echo());
    let (engine, _) = build_engine(provider.clone(), &test_config(), &[]);

    let output = engine
        .translate_markdown(MIXED_DOCUMENT, TranslateOptions::default())
        .await
        .unwrap();

    assert!(output.contains("中译:T"));
    assert!(output.contains("中译:Hello world."));
    assert!(output.contains("const x=1;"));
    assert!(!output.contains("中译:const"));
}

#[tokio::test]
async fn test_pipeline_codeBlockRecursionEnabled_shouldStillSkipTaggedFences() {
    // A fence with an explicit non-markdown tag is never translated, with or
    // without recursion
    let provider = Arc::new(MockProvider::echo());
    let (engine, _) = build_engine(provider.clone(), &test_config(), &[]);

    let output = engine
        .translate_markdown(
            MIXED_DOCUMENT,
            TranslateOptions {
                translate_markdown_code_blocks: true,
                on_progress: None,
            },
        )
        .await
        .unwrap();

    assert!(output.contains("中译:T"));
    assert!(output.contains("中译:Hello world."));
    assert!(output.contains("const x=1;"));
    assert!(!output.contains("中译:const"));
}

#[tokio::test]
async fn test_pipeline_markdownCodeBlocks_shouldTranslateWhenEnabled() {
    let source = "Intro paragraph.\n\n```md\n## Inner Title\n\nInner body.\n```\n\n```js\nconst name = \"Markdown\";\n```\n";
    let provider = Arc::new(MockProvider::echo());
    let (engine, _) = build_engine(provider.clone(), &test_config(), &[]);

    let output = engine
        .translate_markdown(
            source,
            TranslateOptions {
                translate_markdown_code_blocks: true,
                on_progress: None,
            },
        )
        .await
        .unwrap();

    assert!(output.contains("中译:Intro paragraph."));
    assert!(output.contains("## 中译:Inner Title"));
    assert!(output.contains("中译:Inner body."));
    assert!(output.contains("const name = \"Markdown\";"));
    assert!(!output.contains("中译:const"));
}

#[tokio::test]
async fn test_pipeline_markdownCodeBlocks_shouldStayVerbatimWhenDisabled() {
    let source = "Intro paragraph.\n\n```md\n## Inner Title\n\nInner body.\n```\n";
    let provider = Arc::new(MockProvider::echo());
    let (engine, _) = build_engine(provider.clone(), &test_config(), &[]);

    let output = engine
        .translate_markdown(source, TranslateOptions::default())
        .await
        .unwrap();

    assert!(output.contains("中译:Intro paragraph."));
    assert!(output.contains("## Inner Title"));
    assert!(!output.contains("中译:Inner Title"));
}

#[tokio::test]
async fn test_pipeline_inlineStructures_shouldTranslateOnlyText() {
    let source = "Read the [user guide](https://example.com/guide) and run `cargo build` first.\n";
    let provider = Arc::new(MockProvider::echo());
    let (engine, _) = build_engine(provider.clone(), &test_config(), &[]);

    let output = engine
        .translate_markdown(source, TranslateOptions::default())
        .await
        .unwrap();

    assert!(output.contains("中译:user guide"));
    assert!(output.contains("https://example.com/guide"));
    assert!(output.contains("`cargo build`"));
    assert!(!output.contains("中译:cargo build"));
}

#[tokio::test]
async fn test_pipeline_frontmatter_shouldPassThroughUntranslated() {
    let source = "---\ntitle: internal name\n---\n\nBody text.\n";
    let provider = Arc::new(MockProvider::echo());
    let (engine, _) = build_engine(provider.clone(), &test_config(), &[]);

    let output = engine
        .translate_markdown(source, TranslateOptions::default())
        .await
        .unwrap();

    assert!(output.contains("title: internal name"));
    assert!(!output.contains("中译:internal name"));
    assert!(output.contains("中译:Body text."));
}

#[tokio::test]
async fn test_pipeline_largeDocument_shouldBatchAndTranslateEverySegment() {
    let mut source = String::new();
    for i in 0..25 {
        source.push_str(&format!("Paragraph number {i} with some content.\n\n"));
    }
    let provider = Arc::new(MockProvider::echo());
    let mut config = test_config();
    config.translation.max_batch_segments = 4;
    let (engine, _) = build_engine(provider.clone(), &config, &[]);

    let output = engine
        .translate_markdown(&source, TranslateOptions::default())
        .await
        .unwrap();

    for i in 0..25 {
        assert!(
            output.contains(&format!("中译:Paragraph number {i} with some content.")),
            "segment {i} missing from output"
        );
    }
    // 25 segments in batches of 4
    assert_eq!(provider.request_count(), 7);
}
