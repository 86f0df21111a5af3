//! `GET /v1/context?session_id=...` — inspection only, never sent
//! upstream. Surfaces the same reports the injector computed for the
//! session's memoized static block and most recent dynamic block.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::api::guard::AdminGuard;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ContextQuery {
    pub session_id: String,
}

pub async fn get_context(
    _guard: AdminGuard,
    State(state): State<AppState>,
    Query(query): Query<ContextQuery>,
) -> impl IntoResponse {
    let found = state.session_cache.with(&query.session_id, |cache| {
        (cache.static_report.clone(), cache.last_dynamic_report.clone())
    });

    match found {
        (None, None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no cached context for this session" })),
        )
            .into_response(),
        (static_report, dynamic_report) => Json(serde_json::json!({
            "session_id": query.session_id,
            "static_block": static_report,
            "dynamic_block": dynamic_report,
        }))
        .into_response(),
    }
}
