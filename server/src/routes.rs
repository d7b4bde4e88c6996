use axum::http::StatusCode;
use axum::{routing::get, Router};

use crate::session::handler;
use crate::state::AppState;

/// Build the axum Router.
///
/// Requests are addressed by the first path segment, an opaque session
/// identifier: the bare root mints one and redirects, the identifier alone
/// serves the page shell, and `/events` under it attaches the live stream.
/// Static routes (`/health`) take precedence over the identifier capture.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handler::create_session))
        .route("/health", get(health_check))
        .route("/{session_id}", get(handler::session_page))
        .route("/{session_id}/events", get(handler::session_events))
        .fallback(not_found)
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Any sub-path other than the page shell or the event stream.
async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
