/*!
 * Prompt templates and request envelopes.
 *
 * Two request shapes are issued against the completion service: a
 * translation request whose user message carries a JSON envelope of
 * segments plus glossary, and a judge request carrying flagged translations
 * with their unmet terms. Both instruct the model to answer with JSON only.
 */

use serde::Serialize;

/// Default system prompt for translation requests.
pub const DEFAULT_TRANSLATION_PROMPT: &str = r#"You are an expert technical translator specializing in {source_language} to {target_language} translation of markdown documentation.

## Your Role
- Translate each text segment naturally while preserving meaning and tone
- Follow the glossary strictly: every listed source term must be rendered with its given target term
- Never alter markdown syntax, placeholders, inline code or URLs embedded in a segment
- Keep product names, identifiers and acronyms that have no glossary entry unchanged

## Output Requirements
- Return ONLY valid JSON matching the requested schema
- Include one item for every input segment id
- Do not include any text outside the JSON structure"#;

/// Default system prompt for glossary judge requests.
pub const DEFAULT_JUDGE_PROMPT: &str = r#"You are reviewing translations that are missing a required glossary term.

For each item decide whether the translation is nevertheless acceptable: a term may be correctly declined, abbreviated after first use, or redundant in context. Reject translations where the term was simply dropped or replaced with a different rendering.

Return ONLY valid JSON matching the requested schema."#;

/// A source term / target term pair as it appears on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct TermPair {
    pub source: String,
    pub target: String,
}

/// One segment of a translation request.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentItem {
    pub id: usize,
    pub text: String,
}

/// The JSON envelope of a translation request.
#[derive(Debug, Serialize)]
pub struct TranslationEnvelope {
    pub source_language: String,
    pub target_language: String,
    pub glossary: Vec<TermPair>,
    pub segments: Vec<SegmentItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_terms: Option<Vec<TermPair>>,
}

/// One flagged translation in a judge request.
#[derive(Debug, Serialize)]
pub struct JudgeItem {
    pub id: usize,
    pub source: String,
    pub translation: String,
    pub missing_terms: Vec<TermPair>,
}

/// The JSON envelope of a judge request.
#[derive(Debug, Serialize)]
pub struct JudgeEnvelope {
    pub items: Vec<JudgeItem>,
}

/// Fill the language placeholders of a system prompt template.
pub fn render_system_prompt(template: &str, source_language: &str, target_language: &str) -> String {
    template
        .replace("{source_language}", source_language)
        .replace("{target_language}", target_language)
}

/// Build the user message of a translation request.
pub fn build_translation_message(envelope: &TranslationEnvelope) -> String {
    let payload = serde_json::to_string_pretty(envelope).unwrap_or_else(|_| "{}".to_string());
    format!(
        "INPUT JSON:\n{payload}\n\nReturn JSON only with the exact shape: {{\"translations\": [{{\"id\": <id>, \"text\": <translated>}}, ...]}}.\n- Include one item for every input segment id.\n- Every segment must be translated to {target}.\n- Do not return the original {source} text unless the segment is only punctuation, symbols, or numbers.",
        target = envelope.target_language,
        source = envelope.source_language,
    )
}

/// Build the user message of a judge request.
pub fn build_judge_message(envelope: &JudgeEnvelope) -> String {
    let payload = serde_json::to_string_pretty(envelope).unwrap_or_else(|_| "{}".to_string());
    format!(
        "INPUT JSON:\n{payload}\n\nReturn JSON only with the exact shape: {{\"decisions\": [{{\"id\": <id>, \"accept\": <true|false>, \"reason\": <string>}}, ...]}}."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderSystemPrompt_shouldFillPlaceholders() {
        let rendered = render_system_prompt(DEFAULT_TRANSLATION_PROMPT, "English", "Chinese");
        assert!(rendered.contains("English to Chinese"));
        assert!(!rendered.contains("{source_language}"));
        assert!(!rendered.contains("{target_language}"));
    }

    #[test]
    fn test_buildTranslationMessage_shouldCarryEnvelopeAndInstructions() {
        let envelope = TranslationEnvelope {
            source_language: "English".to_string(),
            target_language: "Simplified Chinese".to_string(),
            glossary: vec![TermPair {
                source: "API".to_string(),
                target: "接口".to_string(),
            }],
            segments: vec![SegmentItem {
                id: 3,
                text: "Use the API.".to_string(),
            }],
            missing_terms: None,
        };

        let message = build_translation_message(&envelope);
        assert!(message.starts_with("INPUT JSON:\n"));
        assert!(message.contains("\"source_language\": \"English\""));
        assert!(message.contains("\"id\": 3"));
        assert!(message.contains("translated to Simplified Chinese"));
        // No missing_terms key when there is nothing to re-emphasize
        assert!(!message.contains("missing_terms"));
    }

    #[test]
    fn test_buildTranslationMessage_missingTerms_shouldBeIncluded() {
        let envelope = TranslationEnvelope {
            source_language: "English".to_string(),
            target_language: "Chinese".to_string(),
            glossary: Vec::new(),
            segments: Vec::new(),
            missing_terms: Some(vec![TermPair {
                source: "API".to_string(),
                target: "接口".to_string(),
            }]),
        };
        assert!(build_translation_message(&envelope).contains("missing_terms"));
    }

    #[test]
    fn test_buildJudgeMessage_shouldCarryItems() {
        let envelope = JudgeEnvelope {
            items: vec![JudgeItem {
                id: 5,
                source: "Use the API.".to_string(),
                translation: "使用该服务。".to_string(),
                missing_terms: vec![TermPair {
                    source: "API".to_string(),
                    target: "接口".to_string(),
                }],
            }],
        };

        let message = build_judge_message(&envelope);
        assert!(message.contains("\"id\": 5"));
        assert!(message.contains("decisions"));
    }
}
