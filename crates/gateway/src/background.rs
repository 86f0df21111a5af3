//! Fire-and-forget post-response pipeline: task analysis, drift checking,
//! lifecycle transitions, and step/decision persistence. None of this
//! blocks the caller's response, which is already on the wire by the
//! time this runs.

use std::sync::Arc;

use chrono::Duration;
use grov_domain::session::{
    Decision, Session, SessionMode, SessionPatch, Step, TeamMemoryExtraction,
};
use grov_domain::trace::TraceEvent;
use grov_llm::{band_for_score, DriftBand, TaskAction};
use grov_store::{NewDriftEvent, NewStep};

use crate::state::AppState;

pub struct TurnOutcome {
    pub project_path: String,
    pub session: Option<Session>,
    pub latest_user_message: String,
    pub recent_steps: Vec<Step>,
    pub assistant_text: String,
    pub parsed_actions: Vec<grov_adapter::ParsedAction>,
    pub is_end_turn: bool,
    pub context_tokens: u64,
}

pub async fn run(state: Arc<AppState>, outcome: TurnOutcome) {
    let sessions = &state.store;

    // Persist token count regardless of end-turn status (invariant e: set,
    // never incremented).
    if let Some(session) = &outcome.session {
        if let Err(err) = sessions.update_session(
            &session.id,
            SessionPatch {
                context_tokens: Some(outcome.context_tokens),
                ..Default::default()
            },
        ) {
            tracing::warn!(error = %err, "failed to persist context token count");
        }
    }

    if !outcome.is_end_turn {
        // Mid-turn response: same session continues, no classification,
        // no drift check — avoids quadratic LLM calls across tool loops.
        return;
    }

    if let Err(err) = run_end_of_turn(&state, outcome).await {
        tracing::warn!(error = %err, "end-of-turn orchestration failed");
    }
}

async fn run_end_of_turn(state: &AppState, outcome: TurnOutcome) -> grov_domain::Result<()> {
    let TurnOutcome {
        project_path,
        session,
        latest_user_message,
        recent_steps,
        assistant_text,
        parsed_actions,
        ..
    } = outcome;

    // Recovery-alignment check takes priority over ordinary drift scoring
    // whenever the session is already waiting on a proposed recovery.
    if let Some(session) = &session {
        if session.mode != SessionMode::Normal && session.waiting_for_recovery {
            if let Some(step) = recent_steps.first() {
                let plan = session
                    .pending_correction
                    .as_deref()
                    .or(session.pending_forced_recovery.as_deref())
                    .unwrap_or("");
                let verdict = state.recovery.check(plan, step).await;
                let patch = if verdict.aligned {
                    SessionPatch {
                        mode: Some(SessionMode::Normal),
                        escalation: Some(0),
                        waiting_for_recovery: Some(false),
                        pending_correction: Some(None),
                        pending_forced_recovery: Some(None),
                        ..Default::default()
                    }
                } else {
                    SessionPatch {
                        escalation: Some(session.escalation + 1),
                        ..Default::default()
                    }
                };
                state.store.update_session(&session.id, patch)?;
                return persist_validated_steps(state, &session.id, &parsed_actions, 8).await;
            }
        }
    }

    let analysis = state
        .task_analysis
        .analyze(session.as_ref(), &latest_user_message, &recent_steps, &assistant_text)
        .await;

    let intent = if session.is_none() {
        Some(state.intent.extract(&latest_user_message).await)
    } else {
        None
    };

    let from_status = session.as_ref().map(|s| format!("{:?}", s.status));

    let closing = matches!(analysis.action, TaskAction::TaskComplete | TaskAction::SubtaskComplete);
    let extraction = if closing {
        if let Some(session) = &session {
            let validated = state.store.get_validated_steps(&session.id)?;
            Some(build_extraction(state, session, &validated).await)
        } else {
            None
        }
    } else {
        None
    };

    let retention = Duration::hours(state.config.sessions.completion_retention_hours as i64);
    let completed_sibling = state
        .store
        .get_completed_session_for_project(&project_path, retention)?;

    let outcome = grov_orchestrator::apply(
        &state.store,
        &state.config.orchestrator,
        &project_path,
        session,
        completed_sibling,
        &analysis,
        intent.as_ref(),
        extraction,
    )?;

    if let Some(ref closed) = outcome.promoted {
        tracing::info!(team_memory_id = closed.id, goal = %closed.goal, "promoted session to team memory");
        TraceEvent::TeamMemoryPromoted {
            session_id: closed.id.to_string(),
            project_path: project_path.clone(),
            decisions: closed.decisions.len(),
            reasoning_entries: closed.reasoning_trace.len(),
        }
        .emit();
    }

    let Some(session) = outcome.session else {
        // Closed with no parent to return to (plain task_complete).
        return Ok(());
    };

    TraceEvent::SessionTransition {
        session_id: session.id.clone(),
        from_status: from_status.unwrap_or_else(|| "none".to_string()),
        action: format!("{:?}", analysis.action).to_lowercase(),
        to_status: format!("{:?}", session.status),
    }
    .emit();

    run_drift_check(state, &session, &latest_user_message, &recent_steps, &parsed_actions).await
}

async fn run_drift_check(
    state: &AppState,
    session: &Session,
    latest_user_message: &str,
    recent_steps: &[Step],
    parsed_actions: &[grov_adapter::ParsedAction],
) -> grov_domain::Result<()> {
    let request_count = session.request_count + 1;
    state.store.update_session(
        &session.id,
        SessionPatch {
            request_count: Some(request_count),
            ..Default::default()
        },
    )?;

    let interval = state.config.drift.check_interval_turns.max(1) as u64;
    let should_check = request_count % interval == 0 || session.last_checked_at == session.created_at;
    if !should_check {
        return persist_validated_steps(state, &session.id, parsed_actions, 8).await;
    }

    let result = state.drift.check(session, recent_steps, latest_user_message).await;
    let band = band_for_score(result.score, session.escalation, &state.config.drift);

    let patch = match band {
        DriftBand::Realigned => SessionPatch {
            mode: Some(SessionMode::Normal),
            escalation: Some(0),
            waiting_for_recovery: Some(false),
            pending_correction: Some(None),
            ..Default::default()
        },
        DriftBand::Caution => SessionPatch {
            pending_correction: Some(Some(result.diagnostic.clone())),
            ..Default::default()
        },
        DriftBand::Drifted => SessionPatch {
            mode: Some(SessionMode::Drifted),
            waiting_for_recovery: Some(true),
            escalation: Some(session.escalation + 1),
            pending_correction: Some(Some(result.diagnostic.clone())),
            ..Default::default()
        },
        DriftBand::Forced => SessionPatch {
            mode: Some(SessionMode::Forced),
            escalation: Some(session.escalation + 1),
            pending_forced_recovery: Some(Some(
                result
                    .recovery_plan
                    .clone()
                    .map(|p| p.join("; "))
                    .unwrap_or_else(|| result.diagnostic.clone()),
            )),
            ..Default::default()
        },
    };
    state.store.update_session(&session.id, patch)?;

    let new_escalation = match band {
        DriftBand::Realigned => 0,
        DriftBand::Caution => session.escalation,
        DriftBand::Drifted | DriftBand::Forced => session.escalation + 1,
    };
    TraceEvent::DriftScored {
        session_id: session.id.clone(),
        score: result.score,
        mode: format!("{band:?}").to_lowercase(),
        escalation: new_escalation,
    }
    .emit();

    let skip_steps = result.score < state.config.drift.drift_score;
    if skip_steps {
        for action in parsed_actions {
            state.store.log_drift_event(
                &session.id,
                NewDriftEvent {
                    action_kind: action.kind.clone(),
                    score: result.score,
                    diagnostic: result.diagnostic.clone(),
                    recovery_plan: result.recovery_plan.clone(),
                },
            )?;
        }
        Ok(())
    } else {
        persist_validated_steps(state, &session.id, parsed_actions, result.score).await
    }
}

async fn persist_validated_steps(
    state: &AppState,
    session_id: &str,
    parsed_actions: &[grov_adapter::ParsedAction],
    drift_score: u8,
) -> grov_domain::Result<()> {
    for action in parsed_actions {
        state.store.append_step(
            session_id,
            NewStep {
                kind: action.kind.clone(),
                files: action.files.clone(),
                folders: action.folders.clone(),
                command: action.command.clone(),
                reasoning: action.reasoning.clone(),
                drift_score,
                is_validated: true,
                is_key_decision: action.kind == "edit" || action.kind == "write",
            },
        )?;
    }
    Ok(())
}

async fn build_extraction(
    state: &AppState,
    session: &Session,
    validated_steps: &[Step],
) -> TeamMemoryExtraction {
    let extract = state.reasoning.extract(validated_steps).await;
    let files_touched = state
        .store
        .get_edited_files(&session.id)
        .unwrap_or_default();

    let file_reasoning = files_touched
        .iter()
        .map(|file| {
            let reasoning = validated_steps
                .iter()
                .filter(|s| s.files.contains(file))
                .filter_map(|s| s.reasoning.clone())
                .collect::<Vec<_>>()
                .join("; ");
            (file.clone(), reasoning)
        })
        .collect();

    TeamMemoryExtraction {
        reasoning_trace: extract.conclusions,
        decisions: extract
            .decisions
            .into_iter()
            .map(|d| Decision {
                choice: d.choice,
                reason: d.reason,
            })
            .collect(),
        files_touched,
        tags: session.keywords.clone(),
        file_reasoning,
    }
}
