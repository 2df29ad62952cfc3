#![deny(missing_docs)]
//! Token counting for fractal.
//!
//! Two counters behind one trait: [`BpeCounter`] mirrors the `cl100k_base`
//! BPE exactly and is used on correctness-critical paths (assembling LLM
//! context), while [`EstimateCounter`] is a cheap character heuristic that
//! is good enough for eviction-threshold decisions.
//!
//! Both are pure and stateless per call. The BPE table is a process-wide
//! lazy singleton; if it fails to load, [`BpeCounter`] degrades to the
//! estimator and logs once per process.

use std::sync::{Once, OnceLock};

use tiktoken_rs::CoreBPE;

/// Fixed per-message token overhead (role framing, separators).
pub const MESSAGE_OVERHEAD: usize = 4;

/// Reports the token count of an arbitrary string.
pub trait TokenCounter: Send + Sync {
    /// Count tokens in `text`. Returns 0 for the empty string.
    fn count(&self, text: &str) -> usize;

    /// Count tokens in a message body, including the per-message framing
    /// overhead.
    fn count_message(&self, text: &str) -> usize {
        self.count(text) + MESSAGE_OVERHEAD
    }
}

/// Character-class heuristic counter: ~4 chars per token for ASCII text,
/// ~2 chars per token for CJK.
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimateCounter;

impl EstimateCounter {
    /// Create an estimator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF      // CJK Unified Ideographs
        | 0x3400..=0x4DBF    // CJK Extension A
        | 0x3040..=0x30FF    // Hiragana + Katakana
        | 0xAC00..=0xD7AF    // Hangul syllables
        | 0xF900..=0xFAFF    // CJK Compatibility Ideographs
    )
}

impl TokenCounter for EstimateCounter {
    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let (cjk, other) = text.chars().fold((0usize, 0usize), |(cjk, other), c| {
            if is_cjk(c) {
                (cjk + 1, other)
            } else {
                (cjk, other + 1)
            }
        });
        cjk.div_ceil(2) + other.div_ceil(4)
    }
}

static BPE: OnceLock<Option<CoreBPE>> = OnceLock::new();
static BPE_FALLBACK_WARNING: Once = Once::new();

fn bpe() -> Option<&'static CoreBPE> {
    BPE.get_or_init(|| match tiktoken_rs::cl100k_base() {
        Ok(bpe) => Some(bpe),
        Err(_) => None,
    })
    .as_ref()
}

/// Exact BPE counter mirroring `cl100k_base`.
///
/// Falls back to [`EstimateCounter`] when the BPE table cannot be loaded;
/// the fallback is logged once per process.
#[derive(Debug, Clone, Copy, Default)]
pub struct BpeCounter {
    estimator: EstimateCounter,
}

impl BpeCounter {
    /// Create a BPE counter. The table itself loads lazily on first use.
    #[must_use]
    pub fn new() -> Self {
        Self {
            estimator: EstimateCounter::new(),
        }
    }
}

impl TokenCounter for BpeCounter {
    fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match bpe() {
            Some(bpe) => bpe.encode_with_special_tokens(text).len(),
            None => {
                BPE_FALLBACK_WARNING.call_once(|| {
                    tracing::warn!("BPE table unavailable, falling back to character estimate");
                });
                self.estimator.count(text)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_counts_zero() {
        assert_eq!(EstimateCounter::new().count(""), 0);
        assert_eq!(BpeCounter::new().count(""), 0);
    }

    #[test]
    fn ascii_estimate_is_quarter_chars() {
        // 40 ASCII chars -> 10 tokens
        let text = "a".repeat(40);
        assert_eq!(EstimateCounter::new().count(&text), 10);
    }

    #[test]
    fn cjk_estimate_is_half_chars() {
        let text = "你好世界".repeat(5); // 20 CJK chars -> 10 tokens
        assert_eq!(EstimateCounter::new().count(&text), 10);
    }

    #[test]
    fn mixed_text_sums_both_classes() {
        // 8 ASCII (2 tokens) + 4 CJK (2 tokens)
        assert_eq!(EstimateCounter::new().count("abcdefgh你好世界"), 4);
    }

    #[test]
    fn message_count_adds_overhead() {
        let counter = EstimateCounter::new();
        assert_eq!(counter.count_message("abcd"), 1 + MESSAGE_OVERHEAD);
    }

    #[test]
    fn bpe_counts_are_stable() {
        let counter = BpeCounter::new();
        let a = counter.count("the quick brown fox jumps over the lazy dog");
        let b = counter.count("the quick brown fox jumps over the lazy dog");
        assert_eq!(a, b);
        assert!(a > 0);
    }

    #[test]
    fn estimate_rounds_up() {
        // 1 ASCII char is still 1 token, not 0.
        assert_eq!(EstimateCounter::new().count("a"), 1);
        assert_eq!(EstimateCounter::new().count("你"), 1);
    }
}
