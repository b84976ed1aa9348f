/*!
 * Heuristic detection of untranslated model output.
 *
 * The model occasionally echoes source-language text back instead of
 * translating it. This check only fires for segments whose source looks like
 * natural prose; code-ish fragments, short labels and URLs are exempt, so
 * it can be used to re-queue segments without false-positive loops.
 */

use once_cell::sync::Lazy;
use regex::Regex;

use crate::translation::estimate::is_cjk;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]+(?:'[A-Za-z]+)?").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)https?://").unwrap());

/// Minimum trimmed length before a source is considered prose.
const MIN_PROSE_LEN: usize = 30;
/// Minimum fraction of alphabetic characters for prose.
const MIN_ALPHA_DENSITY: f64 = 0.45;
/// Minimum English-like word count for prose.
const MIN_PROSE_WORDS: usize = 6;
/// Word-overlap ratio above which a translation counts as an echo.
const OVERLAP_THRESHOLD: f64 = 0.85;

fn contains_cjk(text: &str) -> bool {
    text.chars().any(is_cjk)
}

fn english_word_count(text: &str) -> usize {
    WORD_RE.find_iter(text).count()
}

/// Lowercase, strip non-alphanumerics and collapse whitespace so that
/// punctuation or casing changes don't hide an otherwise identical echo.
fn normalize_comparable(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_space = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_space = false;
        } else if !last_space {
            out.push(' ');
            last_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Whether a source segment looks like natural-language prose worth
/// checking: long enough, no CJK, no URL, mostly alphabetic, several words.
pub fn is_natural_language_segment(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < MIN_PROSE_LEN {
        return false;
    }
    if contains_cjk(trimmed) {
        return false;
    }
    if URL_RE.is_match(trimmed) {
        return false;
    }
    let total = trimmed.chars().count();
    let alpha = trimmed.chars().filter(|c| c.is_ascii_alphabetic()).count();
    if (alpha as f64) / (total as f64) < MIN_ALPHA_DENSITY {
        return false;
    }
    english_word_count(trimmed) >= MIN_PROSE_WORDS
}

/// Whether a produced translation is likely just the untranslated source.
///
/// Only applies to natural-language sources. The translation is flagged when
/// it is empty, or when it contains no CJK and either normalizes to the same
/// string as the source or shares at least 85% of its words with it.
pub fn is_likely_untranslated(source: &str, translation: &str) -> bool {
    if !is_natural_language_segment(source) {
        return false;
    }
    let translated = translation.trim();
    if translated.is_empty() {
        return true;
    }
    if contains_cjk(translated) {
        return false;
    }

    let source_normalized = normalize_comparable(source);
    let translated_normalized = normalize_comparable(translated);
    if translated_normalized.is_empty() {
        return true;
    }
    if source_normalized == translated_normalized {
        return true;
    }

    let source_words: Vec<&str> = source_normalized.split_whitespace().collect();
    let translated_words: Vec<&str> = translated_normalized.split_whitespace().collect();
    if source_words.len() < 6 || translated_words.len() < 4 {
        return false;
    }

    let source_set: std::collections::HashSet<&str> = source_words.iter().copied().collect();
    let overlap = translated_words.iter().filter(|w| source_set.contains(**w)).count();
    let ratio = (overlap as f64) / (source_words.len().max(translated_words.len()) as f64);
    ratio >= OVERLAP_THRESHOLD
}
