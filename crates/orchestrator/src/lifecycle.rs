//! The task-lifecycle state machine: maps (current session state, task
//! analysis action) to a store mutation.

use grov_domain::config::OrchestratorConfig;
use grov_domain::session::{
    Session, SessionKind, SessionPatch, SessionStatus, TeamMemoryEntry, TeamMemoryExtraction,
};
use grov_domain::{Error, Result};
use grov_llm::task_analysis::{TaskAction, TaskAnalysis};
use grov_llm::Intent;
use grov_store::{NewSession, Store};

/// Outcome of applying one lifecycle transition.
pub struct LifecycleOutcome {
    /// The session a reply to this turn now belongs to, if any (`None`
    /// only when a `subtask_complete`/`task_complete` closes the last
    /// session for a project with no parent to return to).
    pub session: Option<Session>,
    /// Set when this transition promoted a session to team memory.
    pub promoted: Option<TeamMemoryEntry>,
}

/// Apply one lifecycle transition per the state table: `(current session
/// status, task analysis action) -> result`. `completed_sibling` is the
/// most recently completed session for the project, relevant only for
/// `active + new_task` (it gets deleted so the new main session is the
/// sole active task). `extraction` must be populated by the caller via
/// `grov_llm::reasoning::ReasoningExtractor` ahead of a `task_complete` /
/// `subtask_complete` action — this crate performs no LLM calls itself.
pub fn apply(
    store: &Store,
    config: &OrchestratorConfig,
    project_path: &str,
    current: Option<Session>,
    completed_sibling: Option<Session>,
    analysis: &TaskAnalysis,
    intent: Option<&Intent>,
    extraction: Option<TeamMemoryExtraction>,
) -> Result<LifecycleOutcome> {
    let Some(session) = current else {
        let session = create_main(store, project_path, analysis, intent)?;
        return Ok(LifecycleOutcome {
            session: Some(session),
            promoted: None,
        });
    };

    match (session.status, analysis.action) {
        (SessionStatus::Active, TaskAction::Continue) => {
            let session = maybe_refresh_goal(store, config, session, analysis)?;
            Ok(LifecycleOutcome {
                session: Some(session),
                promoted: None,
            })
        }

        (SessionStatus::Completed, TaskAction::Continue) => {
            let mut patch = SessionPatch {
                status: Some(SessionStatus::Active),
                ..Default::default()
            };
            if let Some(goal) = &analysis.current_goal {
                patch.goal = Some(goal.clone());
            }
            let session = store.update_session(&session.id, patch)?;
            Ok(LifecycleOutcome {
                session: Some(session),
                promoted: None,
            })
        }

        (_, TaskAction::NewTask) => {
            if let Some(sibling) = completed_sibling {
                store.delete_session_cascade(&sibling.id)?;
            }
            let session = create_main(store, project_path, analysis, intent)?;
            Ok(LifecycleOutcome {
                session: Some(session),
                promoted: None,
            })
        }

        (_, TaskAction::Subtask) => {
            let parent = session;
            let child = store.create_session(NewSession {
                project_path: project_path.to_string(),
                goal: analysis
                    .current_goal
                    .clone()
                    .unwrap_or_else(|| parent.goal.clone()),
                expected_scope: parent.expected_scope.clone(),
                constraints: parent.constraints.clone(),
                keywords: parent.keywords.clone(),
                kind: SessionKind::Subtask,
                parent_id: Some(parent.id.clone()),
            })?;
            Ok(LifecycleOutcome {
                session: Some(child),
                promoted: None,
            })
        }

        (_, TaskAction::ParallelTask) => {
            let sibling = store.create_session(NewSession {
                project_path: project_path.to_string(),
                goal: analysis
                    .current_goal
                    .clone()
                    .unwrap_or_else(|| session.goal.clone()),
                expected_scope: session.expected_scope.clone(),
                constraints: session.constraints.clone(),
                keywords: session.keywords.clone(),
                kind: SessionKind::Parallel,
                parent_id: session.parent_id.clone(),
            })?;
            Ok(LifecycleOutcome {
                session: Some(sibling),
                promoted: None,
            })
        }

        (_, TaskAction::SubtaskComplete) => {
            let promoted = promote(store, &session, extraction)?;
            let parent = match &session.parent_id {
                Some(parent_id) => store.get_session(parent_id)?,
                None => None,
            };
            Ok(LifecycleOutcome {
                session: parent,
                promoted: Some(promoted),
            })
        }

        (_, TaskAction::TaskComplete) => {
            let promoted = promote(store, &session, extraction)?;
            Ok(LifecycleOutcome {
                session: None,
                promoted: Some(promoted),
            })
        }
    }
}

fn create_main(
    store: &Store,
    project_path: &str,
    analysis: &TaskAnalysis,
    intent: Option<&Intent>,
) -> Result<Session> {
    let goal = intent
        .map(|i| i.goal.clone())
        .or_else(|| analysis.current_goal.clone())
        .unwrap_or_default();
    store.create_session(NewSession {
        project_path: project_path.to_string(),
        goal,
        expected_scope: intent.map(|i| i.expected_scope.clone()).unwrap_or_default(),
        constraints: intent.map(|i| i.constraints.clone()).unwrap_or_default(),
        keywords: intent.map(|i| i.keywords.clone()).unwrap_or_default(),
        kind: SessionKind::Main,
        parent_id: None,
    })
}

/// Only refresh `goal` when the analyzer reported a different one and the
/// difference is large enough to be a real sub-instruction rather than
/// paraphrase noise.
fn maybe_refresh_goal(
    store: &Store,
    config: &OrchestratorConfig,
    session: Session,
    analysis: &TaskAnalysis,
) -> Result<Session> {
    let Some(new_goal) = &analysis.current_goal else {
        return Ok(session);
    };
    if new_goal == &session.goal {
        return Ok(session);
    }
    let diff = new_goal.len().abs_diff(session.goal.len());
    if diff < config.goal_refresh_min_diff_chars {
        return Ok(session);
    }
    store.update_session(
        &session.id,
        SessionPatch {
            goal: Some(new_goal.clone()),
            ..Default::default()
        },
    )
}

fn promote(
    store: &Store,
    session: &Session,
    extraction: Option<TeamMemoryExtraction>,
) -> Result<TeamMemoryEntry> {
    let extraction = extraction.ok_or_else(|| {
        Error::Other("promotion requires a reasoning extraction computed before calling apply".into())
    })?;
    store.promote_to_team_memory(session, extraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use grov_llm::task_analysis::TaskType;

    fn analysis(action: TaskAction, current_goal: Option<&str>) -> TaskAnalysis {
        TaskAnalysis {
            task_type: TaskType::Implementation,
            action,
            task_id: None,
            current_goal: current_goal.map(str::to_string),
            parent_task_id: None,
            reasoning: "test".to_string(),
            step_reasoning: None,
        }
    }

    #[test]
    fn none_plus_new_task_creates_main_session() {
        let store = Store::open_in_memory().unwrap();
        let outcome = apply(
            &store,
            &OrchestratorConfig::default(),
            "/proj",
            None,
            None,
            &analysis(TaskAction::NewTask, Some("add retries")),
            None,
            None,
        )
        .unwrap();
        let session = outcome.session.expect("session created");
        assert_eq!(session.kind, SessionKind::Main);
        assert_eq!(session.status, SessionStatus::Active);
    }

    #[test]
    fn active_continue_keeps_session_without_goal_churn() {
        let store = Store::open_in_memory().unwrap();
        let created = store
            .create_session(NewSession {
                project_path: "/proj".into(),
                goal: "add retries to the client".into(),
                expected_scope: vec![],
                constraints: vec![],
                keywords: vec![],
                kind: SessionKind::Main,
                parent_id: None,
            })
            .unwrap();
        let outcome = apply(
            &store,
            &OrchestratorConfig::default(),
            "/proj",
            Some(created.clone()),
            None,
            &analysis(TaskAction::Continue, Some("add retries to the client")),
            None,
            None,
        )
        .unwrap();
        assert_eq!(outcome.session.unwrap().goal, created.goal);
    }

    #[test]
    fn completed_continue_reactivates_session() {
        let store = Store::open_in_memory().unwrap();
        let created = store
            .create_session(NewSession {
                project_path: "/proj".into(),
                goal: "add retries".into(),
                expected_scope: vec![],
                constraints: vec![],
                keywords: vec![],
                kind: SessionKind::Main,
                parent_id: None,
            })
            .unwrap();
        let completed = store.mark_completed(&created.id).unwrap();
        let outcome = apply(
            &store,
            &OrchestratorConfig::default(),
            "/proj",
            Some(completed),
            None,
            &analysis(TaskAction::Continue, None),
            None,
            None,
        )
        .unwrap();
        assert_eq!(outcome.session.unwrap().status, SessionStatus::Active);
    }

    #[test]
    fn active_new_task_deletes_completed_sibling() {
        let store = Store::open_in_memory().unwrap();
        let active = store
            .create_session(NewSession {
                project_path: "/proj".into(),
                goal: "implement retries".into(),
                expected_scope: vec![],
                constraints: vec![],
                keywords: vec![],
                kind: SessionKind::Main,
                parent_id: None,
            })
            .unwrap();
        let sibling = store
            .create_session(NewSession {
                project_path: "/proj".into(),
                goal: "unrelated finished task".into(),
                expected_scope: vec![],
                constraints: vec![],
                keywords: vec![],
                kind: SessionKind::Main,
                parent_id: None,
            })
            .unwrap();
        let sibling = store.mark_completed(&sibling.id).unwrap();

        let outcome = apply(
            &store,
            &OrchestratorConfig::default(),
            "/proj",
            Some(active),
            Some(sibling.clone()),
            &analysis(TaskAction::NewTask, Some("rewrite the auth layer")),
            None,
            None,
        )
        .unwrap();
        assert!(outcome.session.is_some());
        assert!(store.get_session(&sibling.id).unwrap().is_none());
    }

    #[test]
    fn subtask_complete_promotes_and_returns_to_parent() {
        let store = Store::open_in_memory().unwrap();
        let parent = store
            .create_session(NewSession {
                project_path: "/proj".into(),
                goal: "ship the feature".into(),
                expected_scope: vec![],
                constraints: vec![],
                keywords: vec![],
                kind: SessionKind::Main,
                parent_id: None,
            })
            .unwrap();
        let child = store
            .create_session(NewSession {
                project_path: "/proj".into(),
                goal: "write the migration".into(),
                expected_scope: vec![],
                constraints: vec![],
                keywords: vec![],
                kind: SessionKind::Subtask,
                parent_id: Some(parent.id.clone()),
            })
            .unwrap();

        let outcome = apply(
            &store,
            &OrchestratorConfig::default(),
            "/proj",
            Some(child.clone()),
            None,
            &analysis(TaskAction::SubtaskComplete, None),
            None,
            Some(TeamMemoryExtraction::default()),
        )
        .unwrap();

        assert!(outcome.promoted.is_some());
        let returned = outcome.session.expect("returns to parent");
        assert_eq!(returned.id, parent.id);
        let child_after = store.get_session(&child.id).unwrap().unwrap();
        assert_eq!(child_after.status, SessionStatus::Completed);
    }

    #[test]
    fn task_complete_without_extraction_errors() {
        let store = Store::open_in_memory().unwrap();
        let session = store
            .create_session(NewSession {
                project_path: "/proj".into(),
                goal: "ship the feature".into(),
                expected_scope: vec![],
                constraints: vec![],
                keywords: vec![],
                kind: SessionKind::Main,
                parent_id: None,
            })
            .unwrap();
        let result = apply(
            &store,
            &OrchestratorConfig::default(),
            "/proj",
            Some(session),
            None,
            &analysis(TaskAction::TaskComplete, None),
            None,
            None,
        );
        assert!(result.is_err());
    }
}
