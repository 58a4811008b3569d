//! End-to-end tests: a mock Paperless API served by axum, scraped through the
//! real client, orchestrator and HTTP server.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

use paperless_exporter::{
    ClientOptions, Exporter, Orchestrator, PaperlessClient, SourceOptions, build_sources,
    server::{AppState, create_router},
};

const TOKEN: &str = "integration-token";

#[derive(Default)]
struct MockState {
    addr: Mutex<Option<SocketAddr>>,
    log_lines: Mutex<Vec<String>>,
    fail_users: Mutex<bool>,
}

async fn require_token(request: Request, next: Next) -> Response {
    let expected = format!("Token {TOKEN}");
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str());

    if authorized {
        next.run(request).await
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

async fn tags(
    State(state): State<Arc<MockState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Value> {
    let addr = (*state.addr.lock()).expect("mock address set");

    if params.get("page").map(String::as_str) == Some("2") {
        return Json(json!({
            "count": 2,
            "next": null,
            "results": [{"id": 2, "slug": "paid", "name": "Paid", "document_count": 1}],
        }));
    }

    Json(json!({
        "count": 2,
        "next": format!("http://{addr}/api/tags/?page=2"),
        "results": [{"id": 1, "slug": "inbox", "name": "Inbox", "document_count": 4}],
    }))
}

async fn documents() -> Json<Value> {
    Json(json!({"count": 5, "next": null, "results": [{}]}))
}

async fn users(State(state): State<Arc<MockState>>) -> Response {
    if *state.fail_users.lock() {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(json!({"count": 2, "next": null, "results": [{}]})).into_response()
}

async fn log_names() -> Json<Value> {
    Json(json!(["paperless", "mail"]))
}

async fn log(State(state): State<Arc<MockState>>, Path(name): Path<String>) -> Response {
    match name.as_str() {
        "paperless" => Json(state.log_lines.lock().clone()).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn spawn_paperless(state: Arc<MockState>) -> SocketAddr {
    let router = Router::new()
        .route("/api/tags/", get(tags))
        .route("/api/documents/", get(documents))
        .route("/api/users/", get(users))
        .route("/api/logs/", get(log_names))
        .route("/api/logs/{name}/", get(log))
        .route_layer(middleware::from_fn(require_token))
        .with_state(Arc::clone(&state));

    let addr = spawn(router).await;
    *state.addr.lock() = Some(addr);
    addr
}

async fn spawn_exporter(paperless: SocketAddr, collectors: &[&str]) -> SocketAddr {
    let client = PaperlessClient::new(
        ClientOptions::new(format!("http://{paperless}"))
            .with_token(TOKEN)
            .with_timeout(Duration::from_secs(5)),
    )
    .unwrap();

    let sources = build_sources(Arc::new(client), collectors, &SourceOptions::default()).unwrap();
    let orchestrator = Orchestrator::new(sources).with_timeout(Duration::from_secs(10));
    let exporter = Exporter::new(orchestrator).unwrap();

    spawn(create_router(AppState {
        exporter: Arc::new(exporter),
        telemetry_path: "/metrics".to_string(),
    }))
    .await
}

async fn scrape(exporter: SocketAddr) -> (u16, String) {
    let response = reqwest::get(format!("http://{exporter}/metrics")).await.unwrap();
    let status = response.status().as_u16();
    (status, response.text().await.unwrap())
}

#[tokio::test]
async fn test_scrape_against_mock_paperless() {
    let state = Arc::new(MockState::default());
    state.log_lines.lock().extend([
        "[2024-01-15 10:23:45,123] [INFO] [paperless.consumer] Consuming a.pdf".to_string(),
        "[2024-01-15 10:23:46,000] [ERROR] [paperless.tasks] Task failed".to_string(),
        "Traceback (most recent call last):".to_string(),
    ]);

    let paperless = spawn_paperless(Arc::clone(&state)).await;
    let exporter = spawn_exporter(paperless, &["tag", "log", "user", "document"]).await;

    let (status, body) = scrape(exporter).await;
    assert_eq!(status, 200, "body: {body}");

    assert!(body.contains("# TYPE paperless_documents gauge\n"));
    assert!(body.contains("paperless_documents 5\n"));
    assert!(body.contains("paperless_users 2\n"));
    assert!(body.contains("paperless_tag_info{id=\"1\",name=\"Inbox\",slug=\"inbox\"} 1\n"));
    assert!(body.contains("paperless_tag_info{id=\"2\",name=\"Paid\",slug=\"paid\"} 1\n"));
    assert!(body.contains("paperless_tag_document_count{id=\"1\"} 4\n"));
    assert!(body.contains(
        "paperless_log_entries_total{level=\"info\",module=\"paperless.consumer\",name=\"paperless\"} 1\n"
    ));
    assert!(body.contains(
        "paperless_log_entries_total{level=\"error\",module=\"paperless.tasks\",name=\"paperless\"} 1\n"
    ));
    assert!(body.contains("paperless_warnings_total{category=\"unspecified\"} 0\n"));
    assert!(!body.contains("paperless_error"));

    // Only entries after the watermark are counted on the next scrape.
    state.log_lines.lock().push(
        "[2024-01-15 10:24:00,000] [INFO] [paperless.consumer] Consuming b.pdf".to_string(),
    );

    let (status, body) = scrape(exporter).await;
    assert_eq!(status, 200, "body: {body}");
    assert!(body.contains(
        "paperless_log_entries_total{level=\"info\",module=\"paperless.consumer\",name=\"paperless\"} 2\n"
    ));
    assert!(body.contains(
        "paperless_log_entries_total{level=\"error\",module=\"paperless.tasks\",name=\"paperless\"} 1\n"
    ));
}

#[tokio::test]
async fn test_failing_source_fails_scrape() {
    let state = Arc::new(MockState::default());
    *state.fail_users.lock() = true;

    let paperless = spawn_paperless(Arc::clone(&state)).await;
    let exporter = spawn_exporter(paperless, &["user", "document"]).await;

    let (status, body) = scrape(exporter).await;

    assert_eq!(status, 500);
    assert!(body.starts_with("An error has occurred while serving metrics:"));

    *state.fail_users.lock() = false;
    let (status, _) = scrape(exporter).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_wrong_token_fails_scrape() {
    let paperless = spawn_paperless(Arc::new(MockState::default())).await;

    let client = PaperlessClient::new(ClientOptions::new(format!("http://{paperless}")).with_token("wrong"))
        .unwrap();
    let sources = build_sources(Arc::new(client), &["document"], &SourceOptions::default()).unwrap();
    let exporter = Exporter::new(Orchestrator::new(sources)).unwrap();

    assert!(exporter.scrape().await.is_err());
}

#[tokio::test]
async fn test_healthz_and_landing_page() {
    let paperless = spawn_paperless(Arc::new(MockState::default())).await;
    let exporter = spawn_exporter(paperless, &["document"]).await;

    let health = reqwest::get(format!("http://{exporter}/healthz")).await.unwrap();
    assert_eq!(health.status().as_u16(), 200);

    let landing = reqwest::get(format!("http://{exporter}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(landing.contains("/metrics"));
}
