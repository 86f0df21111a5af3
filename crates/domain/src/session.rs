use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One user goal being pursued in one project.
///
/// Created at the first request of a new task, mutated only by the
/// orchestrator, and transitioned to `Completed` when task analysis
/// classifies the turn as `task_complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project_path: String,
    pub goal: String,
    pub expected_scope: Vec<String>,
    pub constraints: Vec<String>,
    pub keywords: Vec<String>,
    pub kind: SessionKind,
    pub parent_id: Option<String>,
    pub status: SessionStatus,
    pub mode: SessionMode,
    pub escalation: u32,
    pub waiting_for_recovery: bool,
    pub last_checked_at: DateTime<Utc>,
    pub context_tokens: u64,
    pub pending_correction: Option<String>,
    pub pending_forced_recovery: Option<String>,
    pub pending_clear_summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Number of requests classified against this session, used by
    /// request classification to detect retry vs. continuation vs. first.
    pub request_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Main,
    Subtask,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Normal,
    Drifted,
    Forced,
}

/// A patch applied to a session by `Store::update_session`. `None` fields
/// are left untouched; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub goal: Option<String>,
    pub expected_scope: Option<Vec<String>>,
    pub constraints: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub status: Option<SessionStatus>,
    pub mode: Option<SessionMode>,
    pub escalation: Option<u32>,
    pub waiting_for_recovery: Option<bool>,
    pub context_tokens: Option<u64>,
    pub pending_correction: Option<Option<String>>,
    pub pending_forced_recovery: Option<Option<String>>,
    pub pending_clear_summary: Option<Option<String>>,
    pub request_count: Option<u64>,
}

/// One modifying action the model performed in a turn: edit, write,
/// run-command, read, search, ...
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: i64,
    pub session_id: String,
    pub kind: String,
    pub files: Vec<String>,
    pub folders: Vec<String>,
    pub command: Option<String>,
    pub reasoning: Option<String>,
    pub drift_score: u8,
    pub is_validated: bool,
    pub is_key_decision: bool,
    pub created_at: DateTime<Utc>,
}

/// Audit record for an action recorded while drift was below the
/// validation threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftEvent {
    pub id: i64,
    pub session_id: String,
    pub action_kind: String,
    pub score: u8,
    pub diagnostic: String,
    pub recovery_plan: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// A decision made during a session: the choice taken and the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub choice: String,
    pub reason: String,
}

/// A durable record promoted from a completed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMemoryEntry {
    pub id: i64,
    pub project_path: String,
    pub original_query: String,
    pub goal: String,
    /// Short strings prefixed `CONCLUSION:` or `INSIGHT:`.
    pub reasoning_trace: Vec<String>,
    pub decisions: Vec<Decision>,
    pub files_touched: Vec<String>,
    pub tags: Vec<String>,
    pub status: String,
    pub promoted_at: DateTime<Utc>,
}

/// Filter for `Store::search_team_memory`.
#[derive(Debug, Clone, Default)]
pub struct TeamMemoryFilter {
    pub status: Option<String>,
    pub files: Vec<String>,
    pub keywords: Vec<String>,
}

/// The output of reasoning/decision extraction + intent extraction,
/// bundled together for `Store::promote_to_team_memory`.
#[derive(Debug, Clone, Default)]
pub struct TeamMemoryExtraction {
    pub reasoning_trace: Vec<String>,
    pub decisions: Vec<Decision>,
    pub files_touched: Vec<String>,
    pub tags: Vec<String>,
    /// Per-file reasoning extracted for `get_file_reasoning_by_path_pattern`.
    pub file_reasoning: Vec<(String, String)>,
}
