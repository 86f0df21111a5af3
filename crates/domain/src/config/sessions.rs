use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session / orchestrator tuning
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// How long a completed session remains eligible for reactivation
    /// and is considered by `get_completed_session_for_project`, before
    /// the periodic sweep deletes it.
    #[serde(default = "d_retention_hours")]
    pub completion_retention_hours: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            completion_retention_hours: d_retention_hours(),
        }
    }
}

/// Tunables for the task-lifecycle state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// On a `continue` action, `original_goal` is only refreshed when the
    /// analyzer's reported goal differs from the stored one both in
    /// content and by at least this many characters in length. Resolves
    /// the ambiguity of "how different is different enough" by exposing
    /// it as a knob rather than guessing a fixed number.
    #[serde(default = "d_goal_refresh_min_diff_chars")]
    pub goal_refresh_min_diff_chars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            goal_refresh_min_diff_chars: d_goal_refresh_min_diff_chars(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_retention_hours() -> u64 {
    24
}
fn d_goal_refresh_min_diff_chars() -> usize {
    30
}
