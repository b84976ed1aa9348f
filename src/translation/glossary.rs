/*!
 * Glossary matching and judge decision handling.
 *
 * A glossary maps source terms to mandated target terms. Matching happens on
 * the source side before translation (which terms are present in a segment),
 * and enforcement happens afterwards (does the translation literally contain
 * each matched term's target). Segments that fail enforcement can be sent to
 * a secondary judge model which may accept a translation anyway, e.g. when a
 * term was correctly inflected rather than copied literally.
 */

use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::errors::TranslationError;

/// One glossary rule with its compiled source-term matcher.
#[derive(Debug, Clone)]
pub struct GlossaryEntry {
    /// Source-language term
    pub source: String,
    /// Mandated target-language term
    pub target: String,
    /// Case-insensitive matcher for the source term
    matcher: Regex,
}

impl GlossaryEntry {
    /// Check whether the source term occurs in the given text.
    pub fn matches(&self, text: &str) -> bool {
        self.matcher.is_match(text)
    }
}

/// Compile a flat source -> target mapping into matchable entries.
///
/// Purely alphanumeric terms match on word boundaries, anything else matches
/// as a plain substring; both are case-insensitive. Entries with an empty
/// source or target are dropped.
pub fn build_entries(glossary: &BTreeMap<String, String>) -> Vec<GlossaryEntry> {
    glossary
        .iter()
        .filter(|(source, target)| !source.is_empty() && !target.is_empty())
        .filter_map(|(source, target)| {
            let escaped = regex::escape(source);
            let pattern = if source.chars().all(|c| c.is_ascii_alphanumeric()) {
                format!(r"(?i)\b{}\b", escaped)
            } else {
                format!("(?i){}", escaped)
            };
            let matcher = Regex::new(&pattern).ok()?;
            Some(GlossaryEntry {
                source: source.clone(),
                target: target.clone(),
                matcher,
            })
        })
        .collect()
}

/// Indices of the entries whose source term occurs in the text.
pub fn term_indices(text: &str, entries: &[GlossaryEntry]) -> Vec<usize> {
    entries
        .iter()
        .enumerate()
        .filter(|(_, entry)| entry.matches(text))
        .map(|(i, _)| i)
        .collect()
}

/// Deduplicated union of the entry indices required by a set of segments,
/// preserving first-seen order.
pub fn union_indices(per_segment: &[&[usize]]) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut union = Vec::new();
    for indices in per_segment {
        for &index in *indices {
            if seen.insert(index) {
                union.push(index);
            }
        }
    }
    union
}

/// Check translations against the glossary.
///
/// For each pending segment, every matched source term's target string must
/// literally appear in the produced translation. Returns the map of segment
/// id to unsatisfied entry indices; satisfied segments are absent.
pub fn check_glossary(
    pending: &[usize],
    segment_terms: &[Vec<usize>],
    translations: &[String],
    entries: &[GlossaryEntry],
) -> BTreeMap<usize, Vec<usize>> {
    let mut missing_map = BTreeMap::new();

    for (pos, &id) in pending.iter().enumerate() {
        let required = &segment_terms[id];
        if required.is_empty() {
            continue;
        }
        let translated = translations.get(pos).map(String::as_str).unwrap_or("");
        let missing: Vec<usize> = required
            .iter()
            .copied()
            .filter(|&entry_index| !translated.contains(&entries[entry_index].target))
            .collect();
        if !missing.is_empty() {
            missing_map.insert(id, missing);
        }
    }

    missing_map
}

/// Flatten a missing map into a deduplicated entry-index list, used as extra
/// context for the next retry attempt.
pub fn flatten_missing(missing_map: &BTreeMap<usize, Vec<usize>>) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut flattened = Vec::new();
    for indices in missing_map.values() {
        for &index in indices {
            if seen.insert(index) {
                flattened.push(index);
            }
        }
    }
    flattened
}

/// A judge verdict for one flagged segment.
#[derive(Debug, Clone)]
pub struct JudgeDecision {
    /// Whether the translation is acceptable despite the missing term
    pub accept: bool,
    /// Free-form explanation from the judge
    pub reason: String,
}

/// Parse a judge reply into per-segment decisions.
///
/// The reply must carry a `decisions` array; items with an unusable id are
/// skipped rather than failing the whole reply.
pub fn parse_judge_decisions(parsed: &Value) -> Result<HashMap<usize, JudgeDecision>, TranslationError> {
    let raw = parsed
        .get("decisions")
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationError::ParseFailure("judge response missing decisions array".to_string()))?;

    let mut decisions = HashMap::new();
    for item in raw {
        let Some(object) = item.as_object() else {
            continue;
        };
        let id_value = object.get("id").or_else(|| object.get("index")).or_else(|| object.get("key"));
        let Some(id) = id_value.and_then(coerce_id) else {
            continue;
        };
        let accept = object
            .get("accept")
            .or_else(|| object.get("approve"))
            .or_else(|| object.get("ok"))
            .map(coerce_accept)
            .unwrap_or(false);
        let reason = object
            .get("reason")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        decisions.insert(id, JudgeDecision { accept, reason });
    }

    Ok(decisions)
}

fn coerce_id(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().map(|n| n as usize),
        Value::String(s) => s.trim().parse::<usize>().ok(),
        _ => None,
    }
}

/// Tolerant boolean coercion for judge accept fields.
fn coerce_accept(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "y" | "1"),
        _ => false,
    }
}
