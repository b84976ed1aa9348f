use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for ISO language code handling
///
/// Request envelopes carry display names ("English", "Chinese") rather than
/// codes, so the configured ISO 639-1/639-3 codes are resolved here.
/// Resolve an ISO 639-1 or ISO 639-3 code to its English language name.
pub fn get_language_name(code: &str) -> Result<String> {
    let normalized = code.trim().to_lowercase();

    let language = match normalized.len() {
        2 => Language::from_639_1(&normalized),
        3 => Language::from_639_3(&normalized),
        _ => None,
    };

    language
        .map(|lang| lang.to_name().to_string())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Check whether two language codes refer to the same language.
pub fn language_codes_match(a: &str, b: &str) -> bool {
    match (get_language_name(a), get_language_name(b)) {
        (Ok(name_a), Ok(name_b)) => name_a == name_b,
        _ => a.trim().eq_ignore_ascii_case(b.trim()),
    }
}
