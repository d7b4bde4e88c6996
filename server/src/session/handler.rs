use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{Html, IntoResponse};
use futures_util::Stream;
use tokio::sync::mpsc;

use super::{generate_session_id, subscribe, SessionCommand};
use crate::state::AppState;

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// GET / — mint a fresh session identifier and redirect the browser to it.
pub async fn create_session() -> impl IntoResponse {
    let session_id = generate_session_id();
    tracing::info!(session_id = %session_id, "session created");
    (
        StatusCode::FOUND,
        [(header::LOCATION, format!("/{session_id}"))],
    )
}

/// GET /{session_id} — the page shell. The identifier is an opaque echo of
/// the request path; any string names a valid session. The client attaches
/// to the update stream, renders each record, and treats a stream error as
/// a terminal state (a fresh page load is the only reconnect).
pub async fn session_page(Path(session_id): Path<String>) -> Html<String> {
    let escaped_id = html_escape(&session_id);

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>tally</title>
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #1a1a2e; color: #e0e0e0; display: flex; justify-content: center; align-items: center; min-height: 100vh; margin: 0; }}
        .card {{ background: #16213e; border-radius: 12px; padding: 2rem; max-width: 400px; text-align: center; box-shadow: 0 4px 24px rgba(0,0,0,0.3); }}
        .counter {{ font-size: 4rem; font-weight: 700; color: #fff; font-variant-numeric: tabular-nums; }}
        .status {{ color: #a0a0a0; margin-bottom: 1.5rem; }}
        .status.error {{ color: #e05d5d; }}
        .code {{ font-family: monospace; background: #0f3460; padding: 4px 8px; border-radius: 4px; }}
    </style>
</head>
<body>
    <div class="card">
        <div class="counter" id="counter">&ndash;</div>
        <p class="status" id="status">connecting&hellip;</p>
        <p>Session <span class="code">{id}</span></p>
        <p>Share this page's URL to watch the same counter from any browser.</p>
    </div>
    <script>
        const counter = document.getElementById("counter");
        const status = document.getElementById("status");
        const events = new EventSource(location.pathname.replace(/\/+$/, "") + "/events");
        events.onopen = () => {{
            status.textContent = "live";
            status.classList.remove("error");
        }};
        events.onmessage = (e) => {{
            counter.textContent = e.data;
        }};
        events.onerror = () => {{
            events.close();
            status.textContent = "connection error";
            status.classList.add("error");
        }};
    </script>
</body>
</html>"#,
        id = escaped_id,
    );

    Html(html)
}

/// GET /{session_id}/events — attach a live subscriber to the session's
/// update stream. The response is a server-to-client-only text/event-stream
/// of discrete counter records; dropping the body detaches the subscriber.
pub async fn session_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (subscriber_id, rx, command_tx) = subscribe(&state, &session_id);
    tracing::debug!(
        session_id = %session_id,
        subscriber_id,
        "subscriber stream opened"
    );

    let guard = DetachGuard {
        subscriber_id,
        command_tx,
    };
    let stream = futures_util::stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let event = rx.recv().await?;
        Some((Ok::<_, Infallible>(event), (rx, guard)))
    });

    Sse::new(stream)
}

/// Cleanup handler bound to the connection's lifetime: the SSE body owns
/// this guard, so a client disconnect (the body being dropped) detaches
/// the subscriber. Detach is idempotent on the actor side.
struct DetachGuard {
    subscriber_id: u64,
    command_tx: mpsc::UnboundedSender<SessionCommand>,
}

impl Drop for DetachGuard {
    fn drop(&mut self) {
        let _ = self.command_tx.send(SessionCommand::Detach {
            subscriber_id: self.subscriber_id,
        });
    }
}
