use serde::{Deserialize, Serialize};

/// Observability report for a static-block build — returned by
/// `GET /v1/context` for inspection, never sent upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticBlockReport {
    pub file_reasoning_included: usize,
    pub file_reasoning_dropped: usize,
    pub related_tasks_included: usize,
    pub related_tasks_dropped: usize,
    pub total_chars: usize,
    pub truncated_total_cap: bool,
}

/// Observability report for a dynamic-block build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynamicBlockReport {
    pub edited_files_included: usize,
    pub edited_files_suppressed: usize,
    pub decisions_included: usize,
    pub decisions_dropped_over_cap: usize,
    pub decisions_suppressed: usize,
    pub correction_included: bool,
    pub forced_recovery_included: bool,
    pub total_chars: usize,
}
