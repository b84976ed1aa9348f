/*!
 * Batch planning for translation requests.
 *
 * Segments are grouped into ordered batches under three limits: combined
 * character length, combined estimated token cost, and segment count. The
 * limits bound accumulation, not content: a single segment larger than a
 * limit still gets a batch of its own.
 */

use crate::markdown_processor::Segment;
use crate::translation::estimate;

/// Limits applied while accumulating a batch.
#[derive(Debug, Clone)]
pub struct BatchLimits {
    /// Maximum combined character count per batch
    pub max_chars: usize,
    /// Maximum combined estimated token cost per batch
    pub max_tokens: usize,
    /// Maximum number of segments per batch
    pub max_segments: usize,
    /// Fixed per-request token overhead (system prompt + envelope)
    pub base_tokens: usize,
}

impl BatchLimits {
    /// Token budget left for segment payloads once the fixed request
    /// overhead is subtracted.
    fn token_budget(&self) -> usize {
        self.max_tokens.saturating_sub(self.base_tokens).max(1)
    }
}

/// Group segment ids into ordered batches.
///
/// Greedy left-to-right accumulation: a new batch starts whenever adding the
/// next segment would exceed any limit for a non-empty batch, or the segment
/// count limit is already reached. The union of the returned batches is
/// exactly `indices`, in the original order.
pub fn plan_batches(indices: &[usize], segments: &[Segment], limits: &BatchLimits) -> Vec<Vec<usize>> {
    let token_budget = limits.token_budget();
    let mut batches = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut char_count = 0usize;
    let mut token_count = 0usize;

    for &index in indices {
        let text = &segments[index].text;
        let chars = text.chars().count();
        let tokens = estimate::estimate_segment_tokens(text);

        let exceeds_count = current.len() >= limits.max_segments;
        let exceeds_chars = char_count + chars > limits.max_chars && !current.is_empty();
        let exceeds_tokens = token_count + tokens > token_budget && !current.is_empty();

        if exceeds_count || exceeds_chars || exceeds_tokens {
            batches.push(current);
            current = Vec::new();
            char_count = 0;
            token_count = 0;
        }

        current.push(index);
        char_count += chars;
        token_count += tokens;
    }

    if !current.is_empty() {
        batches.push(current);
    }

    batches
}
