//! HTTP server exposing the metrics endpoint.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::exposition::Exporter;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub exporter: Arc<Exporter>,
    pub telemetry_path: String,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let telemetry_path = state.telemetry_path.clone();
    let app_state = Arc::new(state);

    Router::new()
        .route("/", get(landing_handler))
        .route("/healthz", get(healthz_handler))
        .route(&telemetry_path, get(metrics_handler))
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
        .with_state(app_state)
}

/// Landing page linking to the metrics endpoint.
async fn landing_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>Paperless-ngx exporter</title></head>
<body>
<h1>Paperless-ngx exporter</h1>
<p>Prometheus exporter for Paperless-ngx, version {version}.</p>
<ul><li><a href="{path}">Metrics</a></li></ul>
</body>
</html>
"#,
        version = env!("CARGO_PKG_VERSION"),
        path = state.telemetry_path,
    ))
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Runs one collection cycle per request.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.exporter.scrape().await {
        Ok(body) => ([(header::CONTENT_TYPE, state.exporter.content_type())], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Serving metrics failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("An error has occurred while serving metrics:\n\n{e}"),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{CountedResource, PaperlessApi};
    use crate::collector::{Orchestrator, SourceOptions, build_sources};
    use crate::testutil::FakeApi;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn router(api: FakeApi) -> Router {
        let api: Arc<dyn PaperlessApi> = Arc::new(api);
        let sources = build_sources(api, &["document", "user"], &SourceOptions::default()).unwrap();
        let exporter = Exporter::new(Orchestrator::new(sources)).unwrap();

        create_router(AppState {
            exporter: Arc::new(exporter),
            telemetry_path: "/metrics".to_string(),
        })
    }

    fn healthy_api() -> FakeApi {
        let api = FakeApi::new();
        api.counts.lock().insert(CountedResource::Documents, Some(42));
        api.counts.lock().insert(CountedResource::Users, Some(3));
        api
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (status, body) = get(router(healthy_api()), "/metrics").await;

        assert_eq!(status, StatusCode::OK, "body: {body}");
        assert!(body.contains("paperless_documents 42\n"));
        assert!(body.contains("paperless_users 3\n"));
        assert!(body.contains("paperless_warnings_total{category=\"unspecified\"} 0\n"));
    }

    #[tokio::test]
    async fn test_metrics_endpoint_failure() {
        let api = FakeApi::new();
        api.counts.lock().insert(CountedResource::Documents, Some(42));

        let (status, body) = get(router(api), "/metrics").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("An error has occurred while serving metrics:"));
    }

    #[tokio::test]
    async fn test_landing_page_links_metrics() {
        let (status, body) = get(router(healthy_api()), "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"<a href="/metrics">"#));
    }

    #[tokio::test]
    async fn test_healthz() {
        let (status, body) = get(router(healthy_api()), "/healthz").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, r#"{"status":"ok"}"#);
    }
}
