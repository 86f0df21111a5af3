use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Drift checking
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftConfig {
    /// Run a fresh drift check at most every N end-of-turns per session;
    /// between checks the previous score/mode is reused. Bounds auxiliary
    /// LLM spend.
    #[serde(default = "d_check_interval")]
    pub check_interval_turns: u32,
    /// Score at/above which an action is considered validated and a
    /// session realigns to normal mode.
    #[serde(default = "d_realign_score")]
    pub realign_score: u8,
    /// Score below which mode becomes drifted.
    #[serde(default = "d_drift_score")]
    pub drift_score: u8,
    /// Escalation count at/above which drifted mode becomes forced.
    #[serde(default = "d_forced_escalation")]
    pub forced_escalation: u32,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            check_interval_turns: d_check_interval(),
            realign_score: d_realign_score(),
            drift_score: d_drift_score(),
            forced_escalation: d_forced_escalation(),
        }
    }
}

fn d_check_interval() -> u32 {
    3
}
fn d_realign_score() -> u8 {
    8
}
fn d_drift_score() -> u8 {
    5
}
fn d_forced_escalation() -> u32 {
    3
}
