//! Session resolution: map a project path to the session a request belongs to.

use chrono::Duration;
use grov_domain::config::SessionsConfig;
use grov_domain::session::Session;
use grov_domain::Result;
use grov_store::Store;

/// Look up the active session for a project, falling back to the most
/// recently completed one still inside the retention window. Task
/// analysis uses the latter to decide between `new_task` and reactivating
/// a just-finished one via `continue`.
pub fn resolve_session(
    store: &Store,
    config: &SessionsConfig,
    project_path: &str,
) -> Result<Option<Session>> {
    if let Some(active) = store.get_active_session_for_project(project_path)? {
        return Ok(Some(active));
    }
    let retention = Duration::hours(config.completion_retention_hours as i64);
    store.get_completed_session_for_project(project_path, retention)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grov_domain::session::{SessionKind, SessionStatus};
    use grov_store::NewSession;

    fn new_session(store: &Store, project: &str) -> Session {
        store
            .create_session(NewSession {
                project_path: project.into(),
                goal: "add retries".into(),
                expected_scope: vec![],
                constraints: vec![],
                keywords: vec![],
                kind: SessionKind::Main,
                parent_id: None,
            })
            .unwrap()
    }

    #[test]
    fn prefers_active_session_over_completed() {
        let store = Store::open_in_memory().unwrap();
        new_session(&store, "/p");
        let resolved = resolve_session(&store, &SessionsConfig::default(), "/p")
            .unwrap()
            .unwrap();
        assert_eq!(resolved.status, SessionStatus::Active);
    }

    #[test]
    fn falls_back_to_recently_completed_session() {
        let store = Store::open_in_memory().unwrap();
        let session = new_session(&store, "/p");
        store.mark_completed(&session.id).unwrap();
        let resolved = resolve_session(&store, &SessionsConfig::default(), "/p")
            .unwrap()
            .unwrap();
        assert_eq!(resolved.id, session.id);
        assert_eq!(resolved.status, SessionStatus::Completed);
    }

    #[test]
    fn returns_none_when_no_session_exists() {
        let store = Store::open_in_memory().unwrap();
        assert!(resolve_session(&store, &SessionsConfig::default(), "/empty")
            .unwrap()
            .is_none());
    }
}
