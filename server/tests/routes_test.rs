//! Integration tests for the routing contract: identifier minting and
//! redirect, the page shell, event stream headers, and not-found paths.

use std::time::Duration;

use tokio::net::TcpListener;

use tally_server::state::{AppState, SessionSettings};

/// Boot the real router on a random port with a throwaway data dir.
async fn start_test_server() -> (String, tempfile::TempDir) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = tally_server::db::init_db(&data_dir).expect("Failed to init DB");
    let state = AppState {
        db,
        sessions: tally_server::session::new_session_registry(),
        settings: SessionSettings {
            tick_interval: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(60),
        },
    };

    let app = tally_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), tmp_dir)
}

/// A client that does not follow redirects, so the 302 is observable.
fn no_redirect_client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn root_mints_identifier_and_redirects() {
    let (base_url, _tmp) = start_test_server().await;
    let client = no_redirect_client();

    let resp = client.get(&base_url).send().await.unwrap();
    assert_eq!(resp.status(), 302);

    let location = resp.headers()[reqwest::header::LOCATION].to_str().unwrap();
    let session_id = location.strip_prefix('/').expect("absolute location");
    assert_eq!(session_id.len(), 16);
    assert!(session_id.chars().all(|c| c.is_ascii_alphanumeric()));
}

#[tokio::test]
async fn each_visit_mints_a_distinct_identifier() {
    let (base_url, _tmp) = start_test_server().await;
    let client = no_redirect_client();

    let first = client.get(&base_url).send().await.unwrap();
    let second = client.get(&base_url).send().await.unwrap();
    assert_ne!(
        first.headers()[reqwest::header::LOCATION],
        second.headers()[reqwest::header::LOCATION]
    );
}

#[tokio::test]
async fn page_shell_embeds_identifier_and_stream_wiring() {
    let (base_url, _tmp) = start_test_server().await;

    let resp = reqwest::get(format!("{base_url}/abc123session"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let content_type = resp.headers()[reqwest::header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/html"));

    let body = resp.text().await.unwrap();
    assert!(body.contains("abc123session"));
    assert!(body.contains("EventSource"));
    assert!(body.contains("connection error"));
}

#[tokio::test]
async fn identifiers_are_opaque_strings() {
    let (base_url, _tmp) = start_test_server().await;

    // No validation: any first path segment names a session.
    let resp = reqwest::get(format!("{base_url}/weird.token-123_ok"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn unknown_subpaths_are_not_found() {
    let (base_url, _tmp) = start_test_server().await;

    let resp = reqwest::get(format!("{base_url}/some-session/nope"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = reqwest::get(format!("{base_url}/some-session/events/extra"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn event_stream_uses_sse_content_type() {
    let (base_url, _tmp) = start_test_server().await;

    let resp = reqwest::get(format!("{base_url}/headers-check/events"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let content_type = resp.headers()[reqwest::header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));
}

#[tokio::test]
async fn health_check_responds() {
    let (base_url, _tmp) = start_test_server().await;

    let resp = reqwest::get(format!("{base_url}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}
