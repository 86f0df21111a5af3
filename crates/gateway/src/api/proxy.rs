//! The transparent proxy path: every request that isn't `/health` or
//! `/v1/context` lands here. Implements the full pipeline from §4.6–§4.8:
//! adapter resolution → sub-agent/warmup bypass → session resolution →
//! request classification → CLEAR reset → static/dynamic injection →
//! forward upstream → respond to caller → fire-and-forget post-processing.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::{OriginalUri, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use grov_contextpack::{DynamicBlockBuilder, StaticBlockBuilder};
use grov_domain::session::{Decision, SessionPatch, SessionStatus, TeamMemoryFilter};
use grov_domain::trace::TraceEvent;
use grov_orchestrator::is_warmup_or_noop;
use serde_json::Value;
use uuid::Uuid;

use crate::background::{self, TurnOutcome};
use crate::ranking;
use crate::session_cache::{classify, RequestKind};
use crate::state::AppState;

pub async fn handle(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let req_id = Uuid::new_v4().to_string();
    let started = Instant::now();
    let upstream_url = format!(
        "{}{}",
        state.config.upstream.base_url.trim_end_matches('/'),
        uri.path()
    );

    let Some(adapter) = state.adapters.resolve(&upstream_url) else {
        return (StatusCode::NOT_FOUND, "no adapter configured for this path").into_response();
    };

    let Ok(parsed) = serde_json::from_slice::<Value>(&body) else {
        return forward_raw(adapter.as_ref(), &body, &headers).await;
    };

    if let Some(model) = parsed.get("model").and_then(Value::as_str) {
        if grov_adapter::is_sub_agent_model(model) {
            return forward_raw(adapter.as_ref(), &body, &headers).await;
        }
    }

    let Some(project_path) = adapter.extract_project_path(&parsed) else {
        return forward_raw(adapter.as_ref(), &body, &headers).await;
    };

    let history = adapter.extract_conversation_history(&parsed);
    let latest_user_message = history
        .iter()
        .rev()
        .find(|t| t.role == "user")
        .map(|t| t.text.clone())
        .unwrap_or_default();

    if is_warmup_or_noop(&latest_user_message) {
        return forward_raw(adapter.as_ref(), &body, &headers).await;
    }

    let _permit = state.locks.acquire(&project_path).await;

    let session = match grov_orchestrator::resolve_session(&state.store, &state.config.sessions, &project_path) {
        Ok(s) => s,
        Err(err) => return error_response(&err),
    };

    TraceEvent::SessionResolved {
        session_key: project_path.clone(),
        session_id: session.as_ref().map(|s| s.id.clone()).unwrap_or_default(),
        is_new: session.is_none(),
        reactivated: session.as_ref().is_some_and(|s| s.status == SessionStatus::Completed),
    }
    .emit();

    let current_message_count = history.len();
    let last_is_tool_result =
        history.last().is_some_and(|t| t.role == "tool") || last_message_has_tool_result_block(&parsed);

    let (request_kind, needs_clear) = match &session {
        None => (RequestKind::First, false),
        Some(session) => {
            let kind = state.session_cache.with(&session.id, |cache| {
                let kind = classify(cache.last_message_count, current_message_count, last_is_tool_result);
                cache.last_message_count = current_message_count;
                kind
            });
            let over_threshold = session.context_tokens >= state.config.clear.token_clear_threshold
                && session.pending_clear_summary.is_some();
            (kind, over_threshold)
        }
    };

    TraceEvent::RequestReceived {
        req_id: req_id.clone(),
        session_key: project_path.clone(),
        classification: if needs_clear { "clear".to_string() } else { format!("{request_kind:?}").to_lowercase() },
        message_count: current_message_count,
    }
    .emit();

    // Pre-compute the CLEAR summary in the background once usage crosses
    // the configured ratio of the hard threshold, so it's ready by the
    // time the hard threshold is actually hit.
    if let Some(session) = &session {
        let pre_compute_at =
            (state.config.clear.token_clear_threshold as f64 * state.config.clear.pre_compute_ratio) as u64;
        if session.context_tokens >= pre_compute_at
            && session.pending_clear_summary.is_none()
            && !needs_clear
        {
            spawn_precompute_summary(state.clone(), session.id.clone());
        }
    }

    let forward_body: Vec<u8> = if needs_clear {
        let session = session.as_ref().expect("needs_clear implies a resolved session");
        TraceEvent::ClearTriggered {
            session_id: session.id.clone(),
            context_tokens: session.context_tokens,
            threshold: state.config.clear.token_clear_threshold,
        }
        .emit();
        match build_clear_body(&state, adapter.as_ref(), &parsed, session) {
            Ok(body) => {
                state.session_cache.evict(&session.id);
                body
            }
            Err(err) => return error_response(&err),
        }
    } else {
        match inject_body(&state, &body, &project_path, session.as_ref(), request_kind) {
            Ok((body, trace)) => {
                if let Some(session) = &session {
                    TraceEvent::InjectionApplied {
                        req_id: req_id.clone(),
                        session_id: session.id.clone(),
                        static_bytes: trace.static_bytes,
                        dynamic_bytes: trace.dynamic_bytes,
                        static_cached: trace.static_cached,
                    }
                    .emit();
                }
                body
            }
            Err(err) => return error_response(&err),
        }
    };

    let forward_result = match adapter.forward(&forward_body, &headers).await {
        Ok(r) => r,
        Err(err) => return error_response(&err),
    };

    let response_headers = adapter.filter_response_headers(&forward_result.headers);
    let status = StatusCode::from_u16(forward_result.status).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut response_builder = Response::builder().status(status);
    for (name, value) in response_headers.iter() {
        response_builder = response_builder.header(name, value);
    }
    let content_type = if forward_result.was_event_stream {
        "text/event-stream"
    } else {
        "application/json"
    };
    let response = response_builder
        .header(axum::http::header::CONTENT_TYPE, content_type)
        .body(axum::body::Body::from(forward_result.raw_body_bytes.clone()))
        .unwrap_or_else(|_| (StatusCode::INTERNAL_SERVER_ERROR).into_response());

    let duration_ms = started.elapsed().as_millis() as u64;
    TraceEvent::ResponseForwarded {
        req_id: req_id.clone(),
        status: status.as_u16(),
        was_event_stream: forward_result.was_event_stream,
        duration_ms,
    }
    .emit();

    if let Some(body_object) = &forward_result.body_object {
        let usage = adapter.extract_token_usage(body_object);
        tracing::info!(
            "[{req_id}] {:.0}% | in:{} out:{} | create:{} read:{} | {duration_ms}ms",
            usage.cache_hit_ratio() * 100.0,
            usage.input_tokens,
            usage.output_tokens,
            usage.cache_creation_input_tokens,
            usage.cache_read_input_tokens,
        );

        if adapter.is_valid_response(body_object) {
            schedule_background(
                state,
                adapter,
                project_path,
                session,
                latest_user_message,
                body_object.clone(),
            );
        }
    }

    response
}

/// Anthropic-style wire formats nest tool results as a content block
/// inside a `"role":"user"` message rather than using a distinct role,
/// so the plain role check above misses them; this checks the block
/// shape directly on the raw (vendor-agnostic-enough) JSON.
fn last_message_has_tool_result_block(parsed: &Value) -> bool {
    let Some(messages) = parsed.get("messages").and_then(Value::as_array) else {
        return false;
    };
    let Some(last) = messages.last() else {
        return false;
    };
    let Some(content) = last.get("content").and_then(Value::as_array) else {
        return false;
    };
    content
        .iter()
        .any(|block| block.get("type").and_then(Value::as_str) == Some("tool_result"))
}

async fn forward_raw(adapter: &dyn grov_adapter::AgentAdapter, body: &[u8], headers: &HeaderMap) -> Response {
    match adapter.forward(body, headers).await {
        Ok(result) => {
            let status = StatusCode::from_u16(result.status).unwrap_or(StatusCode::BAD_GATEWAY);
            let headers = adapter.filter_response_headers(&result.headers);
            let mut builder = Response::builder().status(status);
            for (name, value) in headers.iter() {
                builder = builder.header(name, value);
            }
            builder
                .body(axum::body::Body::from(result.raw_body_bytes))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &grov_domain::Error) -> Response {
    let status = match err {
        grov_domain::Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        grov_domain::Error::Upstream { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, err.to_string()).into_response()
}

/// Byte counts and cache status for a single injection, reported via
/// `TraceEvent::InjectionApplied` — never sent upstream itself.
pub struct InjectionTrace {
    pub static_bytes: usize,
    pub dynamic_bytes: usize,
    pub static_cached: bool,
}

/// Build or reuse the memoized static block, then splice it and the
/// per-turn dynamic block into the raw request bytes. The static block
/// is computed exactly once per session and never recomputed — recreating
/// it would change the injected bytes and invalidate the upstream cache.
fn inject_body(
    state: &AppState,
    raw: &[u8],
    project_path: &str,
    session: Option<&grov_domain::session::Session>,
    request_kind: RequestKind,
) -> grov_domain::Result<(Vec<u8>, InjectionTrace)> {
    let Some(session) = session else {
        return Ok((raw.to_vec(), InjectionTrace { static_bytes: 0, dynamic_bytes: 0, static_cached: false }));
    };

    let cached_block = state.session_cache.with(&session.id, |cache| cache.static_block.clone());
    let static_cached = cached_block.is_some();
    let static_block = match cached_block {
        Some(block) => block,
        None => {
            let (block, report) = build_static_block(state, project_path, session)?;
            state.session_cache.with(&session.id, |cache| {
                cache.static_block = Some(block.clone());
                cache.static_report = Some(report);
            });
            block
        }
    };

    let mut out = grov_adapter::rawinject::inject_into_system(raw, &static_block);
    let mut dynamic_bytes = 0;

    if request_kind == RequestKind::First {
        let newly_edited = state.store.get_edited_files(&session.id)?;
        let key_decisions = state.store.get_key_decisions(&session.id, 5)?;
        let decisions: Vec<(i64, Decision)> = key_decisions
            .iter()
            .map(|s| {
                (
                    s.id,
                    Decision {
                        choice: s.kind.clone(),
                        reason: s.reasoning.clone().unwrap_or_default(),
                    },
                )
            })
            .collect();

        let builder = DynamicBlockBuilder::new(state.config.context.max_decisions_per_turn);
        let dynamic_block = state.session_cache.with(&session.id, |cache| {
            let (block, report) = builder.build(
                &mut cache.tracking,
                &newly_edited,
                &decisions,
                session.pending_correction.as_deref(),
                session.pending_forced_recovery.as_deref(),
            );
            cache.last_dynamic_report = Some(report);
            block
        });

        dynamic_bytes = dynamic_block.len();
        if !dynamic_block.is_empty() {
            out = grov_adapter::rawinject::inject_into_last_user_message(&out, &dynamic_block);
        }
    }

    let trace = InjectionTrace { static_bytes: static_block.len(), dynamic_bytes, static_cached };
    Ok((out, trace))
}

fn build_static_block(
    state: &AppState,
    project_path: &str,
    session: &grov_domain::session::Session,
) -> grov_domain::Result<(String, grov_contextpack::StaticBlockReport)> {
    let related = state.store.search_team_memory(
        project_path,
        TeamMemoryFilter {
            status: Some("completed".into()),
            files: Vec::new(),
            keywords: Vec::new(),
        },
    )?;
    let ranked = ranking::rank_related_tasks(related, &session.expected_scope, &session.keywords);
    let file_reasoning = ranking::gather_file_reasoning(&state.store, project_path, &session.expected_scope)?;

    let builder = StaticBlockBuilder::new(
        state.config.context.file_reasoning_max,
        state.config.context.related_tasks_max,
        state.config.context.static_block_max_chars,
    );
    Ok(builder.build(&file_reasoning, &ranked))
}

/// §4.8 CLEAR reset: replace the messages list with an empty sequence,
/// insert the pre-computed summary into the system region, and drop the
/// cached static injection. Callers only reach here when `needs_clear`
/// held, which requires `pending_clear_summary.is_some()`; the fallback
/// below only guards against that invariant being violated.
fn build_clear_body(
    state: &AppState,
    adapter: &dyn grov_adapter::AgentAdapter,
    parsed: &Value,
    session: &grov_domain::session::Session,
) -> grov_domain::Result<Vec<u8>> {
    let summary = session
        .pending_clear_summary
        .clone()
        .unwrap_or_else(|| format!("Goal: {}\n(no pre-computed summary available; continuing from prior context)", session.goal));

    let mut cleared = parsed.clone();
    if let Some(obj) = cleared.as_object_mut() {
        obj.insert("messages".into(), Value::Array(Vec::new()));
    }
    let with_summary = adapter.inject_memory(&cleared, &summary);

    state.store.update_session(
        &session.id,
        SessionPatch {
            pending_clear_summary: Some(None),
            context_tokens: Some(0),
            ..Default::default()
        },
    )?;

    serde_json::to_vec(&with_summary).map_err(grov_domain::Error::Json)
}

fn spawn_precompute_summary(state: AppState, session_id: String) {
    tokio::spawn(async move {
        let Ok(Some(session)) = state.store.get_session(&session_id) else {
            return;
        };
        let Ok(steps) = state.store.get_recent_steps(&session_id, 50) else {
            return;
        };
        let summary = state.summary.generate(&session, &steps).await;
        if let Err(err) = state.store.update_session(
            &session_id,
            SessionPatch {
                pending_clear_summary: Some(Some(summary)),
                ..Default::default()
            },
        ) {
            tracing::warn!(error = %err, "failed to persist pre-computed clear summary");
        }
    });
}

fn schedule_background(
    state: AppState,
    adapter: Arc<dyn grov_adapter::AgentAdapter>,
    project_path: String,
    session: Option<grov_domain::session::Session>,
    latest_user_message: String,
    response_body: Value,
) {
    let state = Arc::new(state);
    tokio::spawn(async move {
        let recent_steps = match &session {
            Some(s) => state.store.get_recent_steps(&s.id, 10).unwrap_or_default(),
            None => Vec::new(),
        };
        let assistant_text = adapter.extract_text_content(&response_body);
        let parsed_actions = adapter.parse_actions(&response_body);
        let is_end_turn = adapter.is_end_turn(&response_body);
        let context_tokens = adapter.extract_token_usage(&response_body).context_tokens();

        background::run(
            state,
            TurnOutcome {
                project_path,
                session,
                latest_user_message,
                recent_steps,
                assistant_text,
                parsed_actions,
                is_end_turn,
                context_tokens,
            },
        )
        .await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_anthropic_style_tool_result_block() {
        let parsed = serde_json::json!({
            "messages": [
                {"role": "user", "content": "do the thing"},
                {"role": "assistant", "content": [{"type": "tool_use", "id": "t1", "name": "edit", "input": {}}]},
                {"role": "user", "content": [{"type": "tool_result", "tool_use_id": "t1", "content": "ok"}]},
            ]
        });
        assert!(last_message_has_tool_result_block(&parsed));
    }

    #[test]
    fn plain_text_last_message_has_no_tool_result_block() {
        let parsed = serde_json::json!({
            "messages": [
                {"role": "user", "content": "hello"},
            ]
        });
        assert!(!last_message_has_tool_result_block(&parsed));
    }

    #[test]
    fn missing_messages_array_is_not_a_tool_result() {
        let parsed = serde_json::json!({"model": "claude-3"});
        assert!(!last_message_has_tool_result_block(&parsed));
    }
}
