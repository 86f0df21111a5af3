use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.store.count_active_sessions().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "health: counting active sessions failed");
        0
    });

    Json(serde_json::json!({
        "status": "ok",
        "sessions": sessions,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "projects_locked": state.locks.project_count(),
    }))
}
