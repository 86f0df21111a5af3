use serde::{Deserialize, Serialize};

/// Token usage as reported by the upstream provider for one turn.
///
/// `context_tokens()` is what the session's token-count field is *set* to
/// (never incremented) per turn — invariant (e) of the data model.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

impl TokenUsage {
    /// Actual upstream context size for this turn: cache writes plus cache
    /// reads. Fresh (uncached) input tokens are excluded — the CLEAR
    /// threshold and pre-compute trigger track the cached context, not the
    /// per-turn input size.
    pub fn context_tokens(&self) -> u64 {
        self.cache_creation_input_tokens + self.cache_read_input_tokens
    }

    /// Fraction of tokens served from cache, for the compact console line.
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.context_tokens();
        if total == 0 {
            return 0.0;
        }
        self.cache_read_input_tokens as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_tokens_excludes_fresh_input_tokens() {
        let usage = TokenUsage {
            input_tokens: 10,
            output_tokens: 500,
            cache_creation_input_tokens: 100,
            cache_read_input_tokens: 900,
        };
        assert_eq!(usage.context_tokens(), 1000);
    }

    #[test]
    fn cache_hit_ratio_zero_when_no_tokens() {
        let usage = TokenUsage::default();
        assert_eq!(usage.cache_hit_ratio(), 0.0);
    }

    #[test]
    fn cache_hit_ratio_computed_from_cache_reads() {
        let usage = TokenUsage {
            input_tokens: 0,
            output_tokens: 0,
            cache_creation_input_tokens: 0,
            cache_read_input_tokens: 90,
        };
        assert_eq!(usage.cache_hit_ratio(), 1.0);
    }
}
