/// Idempotent schema migration, run once at startup. Matches the teacher's
/// "load or create" pattern, adapted to a relational store instead of a
/// JSON-file snapshot.
pub const MIGRATIONS: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id                      TEXT PRIMARY KEY,
    project_path            TEXT NOT NULL,
    goal                    TEXT NOT NULL,
    expected_scope          TEXT NOT NULL DEFAULT '[]',
    constraints             TEXT NOT NULL DEFAULT '[]',
    keywords                TEXT NOT NULL DEFAULT '[]',
    kind                    TEXT NOT NULL,
    parent_id               TEXT,
    status                  TEXT NOT NULL,
    mode                    TEXT NOT NULL,
    escalation              INTEGER NOT NULL DEFAULT 0,
    waiting_for_recovery    INTEGER NOT NULL DEFAULT 0,
    last_checked_at         TEXT NOT NULL,
    context_tokens          INTEGER NOT NULL DEFAULT 0,
    pending_correction      TEXT,
    pending_forced_recovery TEXT,
    pending_clear_summary   TEXT,
    created_at              TEXT NOT NULL,
    updated_at              TEXT NOT NULL,
    request_count           INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (parent_id) REFERENCES sessions(id)
);

CREATE INDEX IF NOT EXISTS idx_sessions_project_status
    ON sessions(project_path, status);

CREATE TABLE IF NOT EXISTS steps (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id      TEXT NOT NULL,
    kind            TEXT NOT NULL,
    files           TEXT NOT NULL DEFAULT '[]',
    folders         TEXT NOT NULL DEFAULT '[]',
    command         TEXT,
    reasoning       TEXT,
    drift_score     INTEGER NOT NULL,
    is_validated    INTEGER NOT NULL DEFAULT 1,
    is_key_decision INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    FOREIGN KEY (session_id) REFERENCES sessions(id)
);

CREATE INDEX IF NOT EXISTS idx_steps_session ON steps(session_id, id);

CREATE TABLE IF NOT EXISTS drift_events (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id      TEXT NOT NULL,
    action_kind     TEXT NOT NULL,
    score           INTEGER NOT NULL,
    diagnostic      TEXT NOT NULL,
    recovery_plan   TEXT,
    created_at      TEXT NOT NULL,
    FOREIGN KEY (session_id) REFERENCES sessions(id)
);

CREATE INDEX IF NOT EXISTS idx_drift_events_session ON drift_events(session_id, id);

CREATE TABLE IF NOT EXISTS team_memory (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    project_path    TEXT NOT NULL,
    original_query  TEXT NOT NULL,
    goal            TEXT NOT NULL,
    reasoning_trace TEXT NOT NULL DEFAULT '[]',
    decisions       TEXT NOT NULL DEFAULT '[]',
    files_touched   TEXT NOT NULL DEFAULT '[]',
    tags            TEXT NOT NULL DEFAULT '[]',
    status          TEXT NOT NULL,
    promoted_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_team_memory_project ON team_memory(project_path);

CREATE TABLE IF NOT EXISTS file_reasoning (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    team_memory_id  INTEGER NOT NULL,
    project_path    TEXT NOT NULL,
    file_path       TEXT NOT NULL,
    reasoning       TEXT NOT NULL,
    FOREIGN KEY (team_memory_id) REFERENCES team_memory(id)
);

CREATE INDEX IF NOT EXISTS idx_file_reasoning_path ON file_reasoning(project_path, file_path);
"#;
