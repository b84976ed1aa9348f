/*!
 * Token cost estimation for batch sizing.
 *
 * Requests are budgeted before they are sent, so the estimate only has to be
 * a stable upper bound, not an exact tokenizer. ASCII words compress to
 * roughly four characters per token, CJK text tokenizes close to one token
 * per code point, and everything else is costed one token per character.
 */

/// Multiplicative safety margin applied on top of the raw estimate.
const SAFETY_FACTOR: f64 = 1.1;

/// Fixed per-segment cost covering the id/text wrapping in the request JSON.
const PER_SEGMENT_OVERHEAD: usize = 8;

/// Check whether a code point falls in the CJK unified ideograph range.
pub fn is_cjk(c: char) -> bool {
    matches!(c, '\u{3400}'..='\u{9FFF}')
}

/// Estimate the token cost of a piece of text.
///
/// ASCII alphanumeric runs cost `ceil(len / 4)` tokens, CJK code points one
/// token each, other non-whitespace characters one token each, whitespace is
/// free. A safety factor is applied to the total.
pub fn estimate_tokens(text: &str) -> usize {
    let mut tokens = 0usize;
    let mut word_len = 0usize;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            word_len += 1;
            continue;
        }
        if word_len > 0 {
            tokens += word_len.div_ceil(4);
            word_len = 0;
        }
        if c.is_whitespace() {
            continue;
        }
        // CJK and all remaining symbols both cost one token apiece
        tokens += 1;
    }
    if word_len > 0 {
        tokens += word_len.div_ceil(4);
    }

    ((tokens as f64) * SAFETY_FACTOR).ceil() as usize
}

/// Estimate the token cost of one segment as it appears inside a batch
/// request, including its share of wrapping metadata.
pub fn estimate_segment_tokens(text: &str) -> usize {
    estimate_tokens(text) + PER_SEGMENT_OVERHEAD
}

/// Estimate the fixed per-request overhead: system instructions plus the
/// envelope scaffolding that is present regardless of how many segments the
/// batch carries. Computed once per run.
pub fn estimate_base_tokens(system_prompt: &str, envelope_scaffold: &str) -> usize {
    estimate_tokens(system_prompt) + estimate_tokens(envelope_scaffold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimateTokens_asciiWords_shouldCompressByFour() {
        // "hello" -> ceil(5/4) = 2, times safety factor, ceil -> 3
        assert_eq!(estimate_tokens("hello"), 3);
        // two short words, whitespace free: 1 + 1 = 2 -> ceil(2.2) = 3
        assert_eq!(estimate_tokens("ab cd"), 3);
    }

    #[test]
    fn test_estimateTokens_cjk_shouldCostOnePerCodePoint() {
        // four ideographs -> 4 -> ceil(4.4) = 5
        assert_eq!(estimate_tokens("你好世界"), 5);
    }

    #[test]
    fn test_estimateTokens_whitespace_shouldBeFree() {
        assert_eq!(estimate_tokens("   \n\t  "), 0);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_estimateTokens_punctuation_shouldCostOneEach() {
        // "a.b" -> word "a" (1) + '.' (1) + word "b" (1) = 3 -> ceil(3.3) = 4
        assert_eq!(estimate_tokens("a.b"), 4);
    }

    #[test]
    fn test_estimateSegmentTokens_shouldIncludeOverhead() {
        let bare = estimate_tokens("some text");
        assert_eq!(estimate_segment_tokens("some text"), bare + PER_SEGMENT_OVERHEAD);
    }

    #[test]
    fn test_estimateBaseTokens_shouldGrowWithPrompt() {
        let small = estimate_base_tokens("short", "{}");
        let large = estimate_base_tokens(&"word ".repeat(100), "{}");
        assert!(large > small);
    }

    #[test]
    fn test_isCjk_shouldMatchIdeographRange() {
        assert!(is_cjk('中'));
        assert!(is_cjk('译'));
        assert!(!is_cjk('a'));
        assert!(!is_cjk('é'));
    }
}
