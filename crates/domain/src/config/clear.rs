use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CLEAR reset / pre-emptive summarization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearConfig {
    /// Upstream context size (cache_creation + cache_read, excluding fresh
    /// input tokens) above which the next request is rewritten into an
    /// atomic reset.
    #[serde(default = "d_threshold")]
    pub token_clear_threshold: u64,
    /// Fraction of `token_clear_threshold` at which a pre-emptive summary
    /// is computed in the background, so it is ready by the time the
    /// threshold is actually crossed.
    #[serde(default = "d_pre_compute_ratio")]
    pub pre_compute_ratio: f64,
}

impl Default for ClearConfig {
    fn default() -> Self {
        Self {
            token_clear_threshold: d_threshold(),
            pre_compute_ratio: d_pre_compute_ratio(),
        }
    }
}

fn d_threshold() -> u64 {
    150_000
}
fn d_pre_compute_ratio() -> f64 {
    0.85
}
