use chrono::{DateTime, Duration, Utc};
use grov_domain::session::{
    Decision, DriftEvent, Session, SessionKind, SessionMode, SessionPatch, SessionStatus, Step,
    TeamMemoryEntry, TeamMemoryExtraction, TeamMemoryFilter,
};
use grov_domain::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::schema::MIGRATIONS;

fn to_store_err(e: rusqlite::Error) -> Error {
    Error::Store(e.to_string())
}

fn json_vec(v: &[String]) -> String {
    serde_json::to_string(v).unwrap_or_else(|_| "[]".into())
}

fn parse_json_vec(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

/// Fields required to create a new session; `id`/timestamps are assigned
/// by the store.
pub struct NewSession {
    pub project_path: String,
    pub goal: String,
    pub expected_scope: Vec<String>,
    pub constraints: Vec<String>,
    pub keywords: Vec<String>,
    pub kind: SessionKind,
    pub parent_id: Option<String>,
}

pub struct NewStep {
    pub kind: String,
    pub files: Vec<String>,
    pub folders: Vec<String>,
    pub command: Option<String>,
    pub reasoning: Option<String>,
    pub drift_score: u8,
    pub is_validated: bool,
    pub is_key_decision: bool,
}

pub struct NewDriftEvent {
    pub action_kind: String,
    pub score: u8,
    pub diagnostic: String,
    pub recovery_plan: Option<Vec<String>>,
}

/// Durable, embedded, key-indexed store for sessions, steps, drift events,
/// and the searchable team-memory table.
///
/// Backed by SQLite in WAL mode; writes are serialized through a single
/// mutex-guarded connection, matching the contract that writes succeed
/// atomically or fail with a store error, while reads never fail (they
/// return empty collections on miss).
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(to_store_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(to_store_err)?;
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(to_store_err)?;
        conn.execute_batch(MIGRATIONS).map_err(to_store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(to_store_err)?;
        conn.execute_batch(MIGRATIONS).map_err(to_store_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ── Sessions ─────────────────────────────────────────────────────

    pub fn get_active_session_for_project(&self, project_path: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM sessions WHERE project_path = ?1 AND status = 'active' \
             ORDER BY updated_at DESC LIMIT 1",
            params![project_path],
            row_to_session,
        )
        .optional()
        .map_err(to_store_err)
    }

    pub fn get_completed_session_for_project(
        &self,
        project_path: &str,
        retention: Duration,
    ) -> Result<Option<Session>> {
        let cutoff = (Utc::now() - retention).to_rfc3339();
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM sessions WHERE project_path = ?1 AND status = 'completed' \
             AND updated_at >= ?2 ORDER BY updated_at DESC LIMIT 1",
            params![project_path, cutoff],
            row_to_session,
        )
        .optional()
        .map_err(to_store_err)
    }

    pub fn get_session(&self, id: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM sessions WHERE id = ?1",
            params![id],
            row_to_session,
        )
        .optional()
        .map_err(to_store_err)
    }

    pub fn create_session(&self, new: NewSession) -> Result<Session> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (
                id, project_path, goal, expected_scope, constraints, keywords, kind,
                parent_id, status, mode, escalation, waiting_for_recovery, last_checked_at,
                context_tokens, created_at, updated_at, request_count
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,'active','normal',0,0,?9,0,?10,?10,0)",
            params![
                id,
                new.project_path,
                new.goal,
                json_vec(&new.expected_scope),
                json_vec(&new.constraints),
                json_vec(&new.keywords),
                kind_str(new.kind),
                new.parent_id,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(to_store_err)?;
        drop(conn);
        self.get_session(&id)?
            .ok_or_else(|| Error::Store("session vanished immediately after insert".into()))
    }

    pub fn update_session(&self, id: &str, patch: SessionPatch) -> Result<Session> {
        let conn = self.conn.lock();
        let mut sets: Vec<String> = Vec::new();
        let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        macro_rules! set_field {
            ($field:expr, $col:literal) => {
                if let Some(v) = $field {
                    sets.push(format!("{} = ?", $col));
                    values.push(Box::new(v));
                }
            };
        }

        if let Some(goal) = patch.goal {
            sets.push("goal = ?".into());
            values.push(Box::new(goal));
        }
        if let Some(scope) = patch.expected_scope {
            sets.push("expected_scope = ?".into());
            values.push(Box::new(json_vec(&scope)));
        }
        if let Some(constraints) = patch.constraints {
            sets.push("constraints = ?".into());
            values.push(Box::new(json_vec(&constraints)));
        }
        if let Some(keywords) = patch.keywords {
            sets.push("keywords = ?".into());
            values.push(Box::new(json_vec(&keywords)));
        }
        if let Some(status) = patch.status {
            sets.push("status = ?".into());
            values.push(Box::new(status_str(status).to_string()));
        }
        if let Some(mode) = patch.mode {
            sets.push("mode = ?".into());
            values.push(Box::new(mode_str(mode).to_string()));
        }
        set_field!(patch.escalation, "escalation");
        set_field!(patch.waiting_for_recovery, "waiting_for_recovery");
        set_field!(patch.context_tokens, "context_tokens");
        set_field!(patch.request_count, "request_count");
        if let Some(pending) = patch.pending_correction {
            sets.push("pending_correction = ?".into());
            values.push(Box::new(pending));
        }
        if let Some(pending) = patch.pending_forced_recovery {
            sets.push("pending_forced_recovery = ?".into());
            values.push(Box::new(pending));
        }
        if let Some(pending) = patch.pending_clear_summary {
            sets.push("pending_clear_summary = ?".into());
            values.push(Box::new(pending));
        }

        sets.push("updated_at = ?".into());
        sets.push("last_checked_at = ?".into());
        let now = Utc::now().to_rfc3339();
        values.push(Box::new(now.clone()));
        values.push(Box::new(now));

        let sql = format!("UPDATE sessions SET {} WHERE id = ?", sets.join(", "));
        values.push(Box::new(id.to_string()));

        let param_refs: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        conn.execute(&sql, param_refs.as_slice())
            .map_err(to_store_err)?;
        drop(conn);
        self.get_session(id)?
            .ok_or_else(|| Error::Store(format!("session {id} not found after update")))
    }

    pub fn mark_completed(&self, id: &str) -> Result<Session> {
        self.update_session(
            id,
            SessionPatch {
                status: Some(SessionStatus::Completed),
                ..Default::default()
            },
        )
    }

    pub fn delete_session_cascade(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM drift_events WHERE session_id = ?1", params![id])
            .map_err(to_store_err)?;
        conn.execute("DELETE FROM steps WHERE session_id = ?1", params![id])
            .map_err(to_store_err)?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])
            .map_err(to_store_err)?;
        Ok(())
    }

    // ── Steps ────────────────────────────────────────────────────────

    pub fn append_step(&self, session_id: &str, step: NewStep) -> Result<Step> {
        let conn = self.conn.lock();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO steps (
                session_id, kind, files, folders, command, reasoning, drift_score,
                is_validated, is_key_decision, created_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
            params![
                session_id,
                step.kind,
                json_vec(&step.files),
                json_vec(&step.folders),
                step.command,
                step.reasoning,
                step.drift_score,
                step.is_validated,
                step.is_key_decision,
                now.to_rfc3339(),
            ],
        )
        .map_err(to_store_err)?;
        let id = conn.last_insert_rowid();
        conn.query_row("SELECT * FROM steps WHERE id = ?1", params![id], row_to_step)
            .map_err(to_store_err)
    }

    pub fn get_recent_steps(&self, session_id: &str, n: usize) -> Result<Vec<Step>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT * FROM steps WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(to_store_err)?;
        let mut rows = stmt
            .query_map(params![session_id, n as i64], row_to_step)
            .map_err(to_store_err)?;
        let mut out = Vec::new();
        while let Some(r) = rows.next() {
            out.push(r.map_err(to_store_err)?);
        }
        out.reverse();
        Ok(out)
    }

    pub fn get_validated_steps(&self, session_id: &str) -> Result<Vec<Step>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT * FROM steps WHERE session_id = ?1 AND is_validated = 1 ORDER BY id ASC",
            )
            .map_err(to_store_err)?;
        let rows = stmt
            .query_map(params![session_id], row_to_step)
            .map_err(to_store_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(to_store_err)
    }

    pub fn get_key_decisions(&self, session_id: &str, n: usize) -> Result<Vec<Step>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT * FROM steps WHERE session_id = ?1 AND is_key_decision = 1 \
                 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(to_store_err)?;
        let mut rows = stmt
            .query_map(params![session_id, n as i64], row_to_step)
            .map_err(to_store_err)?;
        let mut out = Vec::new();
        while let Some(r) = rows.next() {
            out.push(r.map_err(to_store_err)?);
        }
        out.reverse();
        Ok(out)
    }

    pub fn get_edited_files(&self, session_id: &str) -> Result<Vec<String>> {
        let steps = self.get_validated_steps(session_id)?;
        let mut files: Vec<String> = steps
            .into_iter()
            .filter(|s| matches!(s.kind.as_str(), "edit" | "write"))
            .flat_map(|s| s.files)
            .collect();
        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Backfill reasoning onto the last turn's steps: every step since the
    /// most recent one that already carries reasoning (or since the start
    /// of the session, if none do).
    pub fn update_recent_steps_reasoning(&self, session_id: &str, text: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let boundary: Option<i64> = conn
            .query_row(
                "SELECT MAX(id) FROM steps WHERE session_id = ?1 AND reasoning IS NOT NULL",
                params![session_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(to_store_err)?
            .flatten();

        let updated = match boundary {
            Some(b) => conn
                .execute(
                    "UPDATE steps SET reasoning = ?1 WHERE session_id = ?2 AND id > ?3",
                    params![text, session_id, b],
                )
                .map_err(to_store_err)?,
            None => conn
                .execute(
                    "UPDATE steps SET reasoning = ?1 WHERE session_id = ?2",
                    params![text, session_id],
                )
                .map_err(to_store_err)?,
        };
        Ok(updated)
    }

    // ── Drift events ─────────────────────────────────────────────────

    pub fn log_drift_event(&self, session_id: &str, event: NewDriftEvent) -> Result<DriftEvent> {
        let conn = self.conn.lock();
        let now = Utc::now();
        let plan = event
            .recovery_plan
            .as_ref()
            .map(|p| json_vec(p));
        conn.execute(
            "INSERT INTO drift_events (session_id, action_kind, score, diagnostic, recovery_plan, created_at) \
             VALUES (?1,?2,?3,?4,?5,?6)",
            params![session_id, event.action_kind, event.score, event.diagnostic, plan, now.to_rfc3339()],
        )
        .map_err(to_store_err)?;
        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT * FROM drift_events WHERE id = ?1",
            params![id],
            row_to_drift_event,
        )
        .map_err(to_store_err)
    }

    // ── Team memory ──────────────────────────────────────────────────

    /// Atomic: insert the team-memory entry (+ file-reasoning rows) and
    /// transition the session to completed, or roll back entirely.
    pub fn promote_to_team_memory(
        &self,
        session: &Session,
        extraction: TeamMemoryExtraction,
    ) -> Result<TeamMemoryEntry> {
        let now = Utc::now();
        let decisions_json =
            serde_json::to_string(&extraction.decisions).map_err(|e| Error::Store(e.to_string()))?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(to_store_err)?;

        tx.execute(
            "INSERT INTO team_memory (
                project_path, original_query, goal, reasoning_trace, decisions,
                files_touched, tags, status, promoted_at
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,'completed',?8)",
            params![
                session.project_path,
                session.goal,
                session.goal,
                json_vec(&extraction.reasoning_trace),
                decisions_json,
                json_vec(&extraction.files_touched),
                json_vec(&extraction.tags),
                now.to_rfc3339(),
            ],
        )
        .map_err(to_store_err)?;
        let team_memory_id = tx.last_insert_rowid();

        for (file_path, reasoning) in &extraction.file_reasoning {
            tx.execute(
                "INSERT INTO file_reasoning (team_memory_id, project_path, file_path, reasoning) \
                 VALUES (?1,?2,?3,?4)",
                params![team_memory_id, session.project_path, file_path, reasoning],
            )
            .map_err(to_store_err)?;
        }

        tx.execute(
            "UPDATE sessions SET status = 'completed', updated_at = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), session.id],
        )
        .map_err(to_store_err)?;

        tx.commit().map_err(to_store_err)?;
        drop(conn);

        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM team_memory WHERE id = ?1",
            params![team_memory_id],
            row_to_team_memory,
        )
        .map_err(to_store_err)
    }

    pub fn search_team_memory(
        &self,
        project_path: &str,
        filter: TeamMemoryFilter,
    ) -> Result<Vec<TeamMemoryEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT * FROM team_memory WHERE project_path = ?1 ORDER BY promoted_at DESC",
            )
            .map_err(to_store_err)?;
        let rows = stmt
            .query_map(params![project_path], row_to_team_memory)
            .map_err(to_store_err)?;
        let mut entries = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(to_store_err)?;

        if let Some(status) = &filter.status {
            entries.retain(|e| &e.status == status);
        }
        if !filter.files.is_empty() {
            entries.retain(|e| {
                filter
                    .files
                    .iter()
                    .any(|f| e.files_touched.iter().any(|t| t == f))
            });
        }
        if !filter.keywords.is_empty() {
            entries.retain(|e| {
                let haystack = format!("{} {}", e.goal, e.original_query).to_lowercase();
                filter
                    .keywords
                    .iter()
                    .any(|k| haystack.contains(&k.to_lowercase()))
            });
        }
        Ok(entries)
    }

    pub fn get_file_reasoning_by_path_pattern(
        &self,
        project_path: &str,
        pattern: &str,
    ) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT file_path, reasoning FROM file_reasoning \
                 WHERE project_path = ?1 AND file_path LIKE ?2 ORDER BY id DESC",
            )
            .map_err(to_store_err)?;
        let rows = stmt
            .query_map(params![project_path, pattern], |row: &Row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(to_store_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(to_store_err)
    }

    // ── Maintenance ──────────────────────────────────────────────────

    /// Delete completed sessions (and their steps/drift events) older
    /// than `max_age`. Returns the number of sessions removed.
    pub fn cleanup_old_completed(&self, max_age: Duration) -> Result<usize> {
        let cutoff = (Utc::now() - max_age).to_rfc3339();
        let ids: Vec<String> = {
            let conn = self.conn.lock();
            let mut stmt = conn
                .prepare(
                    "SELECT id FROM sessions WHERE status = 'completed' AND updated_at < ?1",
                )
                .map_err(to_store_err)?;
            let rows = stmt
                .query_map(params![cutoff], |r| r.get::<_, String>(0))
                .map_err(to_store_err)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(to_store_err)?
        };
        for id in &ids {
            self.delete_session_cascade(id)?;
        }
        Ok(ids.len())
    }

    /// Count sessions currently `active`, for the `/health` liveness report.
    pub fn count_active_sessions(&self) -> Result<u64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM sessions WHERE status = 'active'", [], |r| r.get(0))
            .map_err(to_store_err)
    }
}

// ── row → domain mapping ────────────────────────────────────────────

fn kind_str(kind: SessionKind) -> &'static str {
    match kind {
        SessionKind::Main => "main",
        SessionKind::Subtask => "subtask",
        SessionKind::Parallel => "parallel",
    }
}

fn parse_kind(s: &str) -> SessionKind {
    match s {
        "subtask" => SessionKind::Subtask,
        "parallel" => SessionKind::Parallel,
        _ => SessionKind::Main,
    }
}

fn status_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Active => "active",
        SessionStatus::Completed => "completed",
    }
}

fn parse_status(s: &str) -> SessionStatus {
    match s {
        "completed" => SessionStatus::Completed,
        _ => SessionStatus::Active,
    }
}

fn mode_str(mode: SessionMode) -> &'static str {
    match mode {
        SessionMode::Normal => "normal",
        SessionMode::Drifted => "drifted",
        SessionMode::Forced => "forced",
    }
}

fn parse_mode(s: &str) -> SessionMode {
    match s {
        "drifted" => SessionMode::Drifted,
        "forced" => SessionMode::Forced,
        _ => SessionMode::Normal,
    }
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_session(row: &Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get("id")?,
        project_path: row.get("project_path")?,
        goal: row.get("goal")?,
        expected_scope: parse_json_vec(&row.get::<_, String>("expected_scope")?),
        constraints: parse_json_vec(&row.get::<_, String>("constraints")?),
        keywords: parse_json_vec(&row.get::<_, String>("keywords")?),
        kind: parse_kind(&row.get::<_, String>("kind")?),
        parent_id: row.get("parent_id")?,
        status: parse_status(&row.get::<_, String>("status")?),
        mode: parse_mode(&row.get::<_, String>("mode")?),
        escalation: row.get::<_, i64>("escalation")? as u32,
        waiting_for_recovery: row.get("waiting_for_recovery")?,
        last_checked_at: parse_dt(&row.get::<_, String>("last_checked_at")?),
        context_tokens: row.get::<_, i64>("context_tokens")? as u64,
        pending_correction: row.get("pending_correction")?,
        pending_forced_recovery: row.get("pending_forced_recovery")?,
        pending_clear_summary: row.get("pending_clear_summary")?,
        created_at: parse_dt(&row.get::<_, String>("created_at")?),
        updated_at: parse_dt(&row.get::<_, String>("updated_at")?),
        request_count: row.get::<_, i64>("request_count")? as u64,
    })
}

fn row_to_step(row: &Row) -> rusqlite::Result<Step> {
    Ok(Step {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        kind: row.get("kind")?,
        files: parse_json_vec(&row.get::<_, String>("files")?),
        folders: parse_json_vec(&row.get::<_, String>("folders")?),
        command: row.get("command")?,
        reasoning: row.get("reasoning")?,
        drift_score: row.get::<_, i64>("drift_score")? as u8,
        is_validated: row.get("is_validated")?,
        is_key_decision: row.get("is_key_decision")?,
        created_at: parse_dt(&row.get::<_, String>("created_at")?),
    })
}

fn row_to_drift_event(row: &Row) -> rusqlite::Result<DriftEvent> {
    let plan: Option<String> = row.get("recovery_plan")?;
    Ok(DriftEvent {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        action_kind: row.get("action_kind")?,
        score: row.get::<_, i64>("score")? as u8,
        diagnostic: row.get("diagnostic")?,
        recovery_plan: plan.map(|p| parse_json_vec(&p)),
        created_at: parse_dt(&row.get::<_, String>("created_at")?),
    })
}

fn row_to_team_memory(row: &Row) -> rusqlite::Result<TeamMemoryEntry> {
    let decisions_raw: String = row.get("decisions")?;
    let decisions: Vec<Decision> = serde_json::from_str(&decisions_raw).unwrap_or_default();
    Ok(TeamMemoryEntry {
        id: row.get("id")?,
        project_path: row.get("project_path")?,
        original_query: row.get("original_query")?,
        goal: row.get("goal")?,
        reasoning_trace: parse_json_vec(&row.get::<_, String>("reasoning_trace")?),
        decisions,
        files_touched: parse_json_vec(&row.get::<_, String>("files_touched")?),
        tags: parse_json_vec(&row.get::<_, String>("tags")?),
        status: row.get("status")?,
        promoted_at: parse_dt(&row.get::<_, String>("promoted_at")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_session(store: &Store, project: &str) -> Session {
        store
            .create_session(NewSession {
                project_path: project.into(),
                goal: "add retry logic to the upstream client".into(),
                expected_scope: vec!["src/client.rs".into()],
                constraints: vec!["no new dependencies".into()],
                keywords: vec!["retry".into(), "client".into()],
                kind: SessionKind::Main,
                parent_id: None,
            })
            .expect("create_session")
    }

    #[test]
    fn create_and_fetch_active_session() {
        let store = Store::open_in_memory().unwrap();
        let created = new_session(&store, "/repo/a");
        let fetched = store
            .get_active_session_for_project("/repo/a")
            .unwrap()
            .expect("active session present");
        assert_eq!(created.id, fetched.id);
        assert_eq!(fetched.status, SessionStatus::Active);
        assert_eq!(fetched.keywords, vec!["retry", "client"]);
    }

    #[test]
    fn update_session_patches_only_given_fields() {
        let store = Store::open_in_memory().unwrap();
        let session = new_session(&store, "/repo/b");
        let updated = store
            .update_session(
                &session.id,
                SessionPatch {
                    mode: Some(SessionMode::Drifted),
                    escalation: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.mode, SessionMode::Drifted);
        assert_eq!(updated.escalation, 1);
        assert_eq!(updated.goal, session.goal);
    }

    #[test]
    fn append_step_and_query_subsets() {
        let store = Store::open_in_memory().unwrap();
        let session = new_session(&store, "/repo/c");
        store
            .append_step(
                &session.id,
                NewStep {
                    kind: "edit".into(),
                    files: vec!["src/client.rs".into()],
                    folders: vec![],
                    command: None,
                    reasoning: Some("retry with exponential backoff".into()),
                    drift_score: 9,
                    is_validated: true,
                    is_key_decision: true,
                },
            )
            .unwrap();
        store
            .append_step(
                &session.id,
                NewStep {
                    kind: "read".into(),
                    files: vec!["src/lib.rs".into()],
                    folders: vec![],
                    command: None,
                    reasoning: None,
                    drift_score: 9,
                    is_validated: false,
                    is_key_decision: false,
                },
            )
            .unwrap();

        assert_eq!(store.get_recent_steps(&session.id, 10).unwrap().len(), 2);
        assert_eq!(store.get_validated_steps(&session.id).unwrap().len(), 1);
        assert_eq!(store.get_key_decisions(&session.id, 5).unwrap().len(), 1);
        assert_eq!(
            store.get_edited_files(&session.id).unwrap(),
            vec!["src/client.rs".to_string()]
        );
    }

    #[test]
    fn log_drift_event_round_trips_recovery_plan() {
        let store = Store::open_in_memory().unwrap();
        let session = new_session(&store, "/repo/d");
        let event = store
            .log_drift_event(
                &session.id,
                NewDriftEvent {
                    action_kind: "edit".into(),
                    score: 4,
                    diagnostic: "touched files outside expected scope".into(),
                    recovery_plan: Some(vec!["revert unrelated file".into()]),
                },
            )
            .unwrap();
        assert_eq!(event.score, 4);
        assert_eq!(
            event.recovery_plan,
            Some(vec!["revert unrelated file".to_string()])
        );
    }

    #[test]
    fn promote_to_team_memory_completes_session_and_indexes_file_reasoning() {
        let store = Store::open_in_memory().unwrap();
        let session = new_session(&store, "/repo/e");
        let extraction = TeamMemoryExtraction {
            reasoning_trace: vec!["CONCLUSION: backoff caps at 30s".into()],
            decisions: vec![Decision {
                choice: "exponential backoff".into(),
                reason: "avoids thundering herd on retries".into(),
            }],
            files_touched: vec!["src/client.rs".into()],
            tags: vec!["networking".into()],
            file_reasoning: vec![(
                "src/client.rs".into(),
                "retry loop now capped at 5 attempts".into(),
            )],
        };

        let entry = store
            .promote_to_team_memory(&session, extraction)
            .unwrap();
        assert_eq!(entry.files_touched, vec!["src/client.rs".to_string()]);

        let completed = store.get_session(&session.id).unwrap().unwrap();
        assert_eq!(completed.status, SessionStatus::Completed);

        let found = store
            .get_file_reasoning_by_path_pattern("/repo/e", "%client.rs")
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "src/client.rs");
    }

    #[test]
    fn search_team_memory_filters_by_keyword() {
        let store = Store::open_in_memory().unwrap();
        let session = new_session(&store, "/repo/f");
        store
            .promote_to_team_memory(
                &session,
                TeamMemoryExtraction {
                    files_touched: vec!["src/client.rs".into()],
                    ..Default::default()
                },
            )
            .unwrap();

        let hits = store
            .search_team_memory(
                "/repo/f",
                TeamMemoryFilter {
                    keywords: vec!["retry".into()],
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(hits.len(), 1);

        let misses = store
            .search_team_memory(
                "/repo/f",
                TeamMemoryFilter {
                    keywords: vec!["unrelated-topic".into()],
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(misses.is_empty());
    }

    #[test]
    fn delete_session_cascade_removes_steps_and_drift_events() {
        let store = Store::open_in_memory().unwrap();
        let session = new_session(&store, "/repo/g");
        store
            .append_step(
                &session.id,
                NewStep {
                    kind: "edit".into(),
                    files: vec![],
                    folders: vec![],
                    command: None,
                    reasoning: None,
                    drift_score: 9,
                    is_validated: true,
                    is_key_decision: false,
                },
            )
            .unwrap();
        store.delete_session_cascade(&session.id).unwrap();
        assert!(store.get_session(&session.id).unwrap().is_none());
        assert!(store.get_recent_steps(&session.id, 10).unwrap().is_empty());
    }

    #[test]
    fn cleanup_old_completed_removes_only_stale_sessions() {
        let store = Store::open_in_memory().unwrap();
        let fresh = new_session(&store, "/repo/h");
        store.mark_completed(&fresh.id).unwrap();

        let removed = store.cleanup_old_completed(Duration::days(30)).unwrap();
        assert_eq!(removed, 0);
        assert!(store.get_session(&fresh.id).unwrap().is_some());

        let removed = store.cleanup_old_completed(Duration::seconds(-1)).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_session(&fresh.id).unwrap().is_none());
    }

    #[test]
    fn count_active_sessions_excludes_completed() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.count_active_sessions().unwrap(), 0);

        let a = new_session(&store, "/repo/i");
        new_session(&store, "/repo/j");
        assert_eq!(store.count_active_sessions().unwrap(), 2);

        store.mark_completed(&a.id).unwrap();
        assert_eq!(store.count_active_sessions().unwrap(), 1);
    }
}
