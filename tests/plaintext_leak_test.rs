// The raw token must never appear in a response body, a log line, or a stored record.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bioportal::api::{create_token_router, TokenAppState};
use bioportal::credentials::{SecretKey, TokenStore};
use bioportal::lifecycle::TokenService;
use bioportal::relay::{HttpRelay, MockRelay, Relay};
use serde_json::json;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "ghp_SuperSecretAccessToken_9f8e7d";

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("bioportal=trace"))
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    (logs, tracing::subscriber::set_default(subscriber))
}

fn create_test_app(relay: Arc<dyn Relay>) -> (Router, Arc<TokenStore>) {
    let store = Arc::new(TokenStore::new(":memory:").unwrap());
    let key = Arc::new(SecretKey::from_bytes([5u8; 32]));
    let service = Arc::new(TokenService::new(key, Arc::clone(&store), relay));
    (create_token_router(TokenAppState { service }), store)
}

async fn post_json(app: &Router, uri: &str, body: serde_json::Value) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[tokio::test]
async fn test_mock_mode_never_leaks_token() {
    let (logs, _guard) = capture_logs();
    let (app, store) = create_test_app(Arc::new(MockRelay));

    let (status, saved) =
        post_json(&app, "/api/save-token", json!({"token": SECRET, "label": "x"})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!saved.contains(SECRET));

    let (status, updated) =
        post_json(&app, "/api/update-bio", json!({"id": 1, "newBio": "hello"})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!updated.contains(SECRET));

    let record = store.get(1).unwrap().unwrap();
    assert!(!record.encrypted_token.contains(SECRET));
    assert!(!format!("{:?}", record).contains(SECRET));

    let (_, deleted) = post_json(&app, "/api/delete-token", json!({"id": 1})).await;
    assert!(!deleted.contains(SECRET));

    let output = logs.contents();
    assert!(output.contains("Token saved"), "logs were not captured: {}", output);
    assert!(!output.contains(SECRET));
}

#[tokio::test]
async fn test_live_mode_failures_never_leak_token() {
    let (logs, _guard) = capture_logs();

    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/bio")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let relay = HttpRelay::new(format!("{}/bio", server.url()), Duration::from_secs(10)).unwrap();
    let (app, _store) = create_test_app(Arc::new(relay));

    post_json(&app, "/api/save-token", json!({"token": SECRET})).await;
    let (status, body) =
        post_json(&app, "/api/update-bio", json!({"id": 1, "newBio": "hello"})).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!body.contains(SECRET));
    assert!(!logs.contents().contains(SECRET));
}
