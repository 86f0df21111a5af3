pub mod context;
pub mod guard;
pub mod health;
pub mod proxy;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Every path other than the two observability routes below is a
/// transparent proxy target — the gateway does not own a fixed route
/// table for the upstream API surface, it forwards whatever path the
/// caller used.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/v1/context", get(context::get_context))
        .fallback(proxy::handle)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
