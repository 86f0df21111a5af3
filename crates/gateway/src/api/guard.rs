//! Admin auth guard for observability endpoints.
//!
//! `GET /v1/context` exposes per-session injection reports, which are
//! debug-only but can still leak project paths and goal text — gated the
//! same way the teacher gates its admin-shaped endpoints. Unlike the
//! teacher's dev-mode fallback, an unset token here disables the endpoint
//! entirely (403) rather than allowing all requests through, matching
//! `AdminConfig`'s documented default.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::Json;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

pub struct AdminGuard;

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected_hash) = &state.admin_token_hash else {
            return Err(forbidden("admin endpoints disabled — set the admin token env var to enable"));
        };

        let provided = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap_or("");
        let provided_hash = Sha256::digest(provided.as_bytes());

        if !bool::from(provided_hash.ct_eq(expected_hash.as_ref())) {
            return Err(forbidden("invalid admin token"));
        }
        Ok(AdminGuard)
    }
}

fn forbidden(message: &str) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::FORBIDDEN, Json(serde_json::json!({ "error": message })))
}
