use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Durable store
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file holding sessions, steps, drift
    /// events, and team memory.
    #[serde(default = "d_db_path")]
    pub db_path: String,
    /// How often the maintenance sweep runs `cleanup_old_completed`.
    #[serde(default = "d_cleanup_interval_sec")]
    pub cleanup_interval_sec: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: d_db_path(),
            cleanup_interval_sec: d_cleanup_interval_sec(),
        }
    }
}

fn d_db_path() -> String {
    "./grov.db".into()
}
fn d_cleanup_interval_sec() -> u64 {
    3_600
}
