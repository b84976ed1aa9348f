/*!
 * Model response normalization.
 *
 * Model replies are expected to contain a JSON object with a `translations`
 * array, but the surrounding text is unreliable: fenced code wrappers,
 * leading prose, or chatty suffixes all occur. Extraction is therefore
 * tolerant; validation of the extracted object is strict. Whatever shape the
 * array takes is decoded exactly once into a tagged union before alignment.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::errors::TranslationError;

static FENCED_JSON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```(?:[Jj][Ss][Oo][Nn])?\s*\n(.*?)```").unwrap());

/// The three accepted shapes of a `translations` array.
enum TranslationsShape {
    /// Every element is a plain string; aligned positionally
    StringArray(Vec<String>),
    /// Elements carry an id and a text; projected onto the expected id order
    ObjectArrayById(std::collections::HashMap<usize, String>),
    /// Anything else; every element coerced to text positionally
    Fallback(Vec<String>),
}

/// Extract and parse a JSON object from raw model output.
///
/// Tries, in order: the whole reply (after stripping one fenced wrapper),
/// fenced JSON blocks, then balanced-brace object candidates found while
/// tracking string and escape state.
pub fn parse_model_response(content: &str) -> Result<Value, TranslationError> {
    let text = strip_code_fence(content.trim());

    if let Ok(value) = serde_json::from_str::<Value>(text) {
        if value.is_object() {
            return Ok(value);
        }
    }

    for captures in FENCED_JSON_RE.captures_iter(content) {
        if let Some(block) = captures.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(block.as_str().trim()) {
                if value.is_object() {
                    return Ok(value);
                }
            }
        }
    }

    for candidate in balanced_objects(text) {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            if value.is_object() {
                return Ok(value);
            }
        }
    }

    Err(TranslationError::ParseFailure(
        "no JSON object found in model response".to_string(),
    ))
}

/// Strip a single leading/trailing fenced-code wrapper if present.
fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Drop the info string up to the first newline
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Balanced `{...}` slices, found with string/escape tracking so braces
/// inside string literals don't produce false candidates.
///
/// Every `{` is treated as a potential object start; a stray unmatched brace
/// earlier in the reply therefore can't hide a valid object after it. The
/// caller tries candidates in order and keeps the first one that parses.
fn balanced_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut candidates = Vec::new();

    for start in 0..bytes.len() {
        if bytes[start] != b'{' {
            continue;
        }
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        for (i, &b) in bytes.iter().enumerate().skip(start) {
            if in_string {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        candidates.push(&text[start..=i]);
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    candidates
}

/// Align a parsed reply to the requested segment ids.
///
/// Returns one translation per expected id, in the input id order. A reply
/// that cannot be aligned (wrong cardinality, or ids with no match) fails
/// with a count mismatch rather than being silently repaired.
pub fn normalize_translations(
    parsed: &Value,
    expected_ids: &[usize],
) -> Result<Vec<String>, TranslationError> {
    let raw = parsed
        .get("translations")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            TranslationError::ParseFailure("model response missing translations array".to_string())
        })?;

    match decode_shape(raw) {
        TranslationsShape::StringArray(values) | TranslationsShape::Fallback(values) => {
            if values.len() != expected_ids.len() {
                return Err(TranslationError::CountMismatch {
                    expected: expected_ids.len(),
                    actual: values.len(),
                    missing_ids: Vec::new(),
                });
            }
            Ok(values)
        }
        TranslationsShape::ObjectArrayById(by_id) => {
            let mut values = Vec::with_capacity(expected_ids.len());
            let mut missing_ids = Vec::new();
            for &id in expected_ids {
                match by_id.get(&id) {
                    Some(text) => values.push(text.clone()),
                    None => missing_ids.push(id),
                }
            }
            if !missing_ids.is_empty() {
                return Err(TranslationError::CountMismatch {
                    expected: expected_ids.len(),
                    actual: expected_ids.len() - missing_ids.len(),
                    missing_ids,
                });
            }
            Ok(values)
        }
    }
}

/// Decode the raw array into one of the three accepted shapes.
fn decode_shape(raw: &[Value]) -> TranslationsShape {
    if raw.iter().all(Value::is_string) {
        return TranslationsShape::StringArray(
            raw.iter()
                .map(|v| v.as_str().unwrap_or_default().to_string())
                .collect(),
        );
    }

    let mut by_id = std::collections::HashMap::new();
    for item in raw {
        let Some(object) = item.as_object() else {
            continue;
        };
        let id = object
            .get("id")
            .or_else(|| object.get("index"))
            .or_else(|| object.get("key"))
            .and_then(coerce_id);
        let text = object
            .get("text")
            .or_else(|| object.get("translation"))
            .or_else(|| object.get("value"))
            .and_then(Value::as_str);
        if let (Some(id), Some(text)) = (id, text) {
            by_id.insert(id, text.to_string());
        }
    }
    if !by_id.is_empty() {
        return TranslationsShape::ObjectArrayById(by_id);
    }

    TranslationsShape::Fallback(raw.iter().map(coerce_text).collect())
}

fn coerce_id(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}

/// Last-resort conversion of an arbitrary array element to text.
fn coerce_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(object) => object
            .get("text")
            .or_else(|| object.get("translation"))
            .or_else(|| object.get("value"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
