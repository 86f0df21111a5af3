use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context builder caps
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Cap on the memoized static team-memory block, in characters.
    #[serde(default = "d_static_max_chars")]
    pub static_block_max_chars: usize,
    /// Max past tasks surfaced in the static block, after file/keyword
    /// overlap ranking and dedup.
    #[serde(default = "d_related_tasks")]
    pub related_tasks_max: usize,
    /// Max file-reasoning entries surfaced for files mentioned in the
    /// user's messages.
    #[serde(default = "d_file_reasoning")]
    pub file_reasoning_max: usize,
    /// Max newly-produced key decisions injected per turn in the dynamic
    /// (delta) block.
    #[serde(default = "d_decisions_per_turn")]
    pub max_decisions_per_turn: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            static_block_max_chars: d_static_max_chars(),
            related_tasks_max: d_related_tasks(),
            file_reasoning_max: d_file_reasoning(),
            max_decisions_per_turn: d_decisions_per_turn(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_static_max_chars() -> usize {
    12_000
}
fn d_related_tasks() -> usize {
    5
}
fn d_file_reasoning() -> usize {
    10
}
fn d_decisions_per_turn() -> usize {
    3
}
