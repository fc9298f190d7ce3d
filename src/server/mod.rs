//! HTTP server.
//!
//! This module implements the HTTP server that:
//! - Accepts webhooks from GitHub, validates signatures, and enqueues the
//!   decoded updates on the event processor
//! - Exposes the metrics registry for Prometheus to scrape
//! - Provides health checks for liveness probes
//!
//! # Endpoints
//!
//! - `POST /<webhook path>` - Accepts GitHub webhook deliveries (default `/`)
//! - `GET /<metrics path>` - Prometheus text exposition (default `/metrics`)
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

use prometheus::Registry;

use crate::processor::ProcessorHandle;
use crate::webhooks::WebhookSecret;

pub mod probes;
pub mod webhook;

pub use probes::{health_handler, metrics_handler};
pub use webhook::webhook_handler;

/// Path of the liveness endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Shared application state.
///
/// This is passed to all handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Producer side of the event processor queue.
    processor: ProcessorHandle,

    /// Webhook secret for HMAC-SHA256 signature verification.
    webhook_secret: WebhookSecret,

    /// Registry rendered by the metrics endpoint.
    registry: Registry,
}

impl AppState {
    pub fn new(processor: ProcessorHandle, webhook_secret: WebhookSecret, registry: Registry) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                processor,
                webhook_secret,
                registry,
            }),
        }
    }

    pub fn processor(&self) -> &ProcessorHandle {
        &self.inner.processor
    }

    pub fn webhook_secret(&self) -> &WebhookSecret {
        &self.inner.webhook_secret
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }
}

/// Where the configurable endpoints are mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePaths {
    pub webhook: String,
    pub metrics: String,
}

impl RoutePaths {
    /// Builds absolute route paths from configured values, which may omit
    /// the leading slash.
    pub fn new(webhook: &str, metrics: &str) -> Self {
        RoutePaths {
            webhook: absolute(webhook),
            metrics: absolute(metrics),
        }
    }
}

impl Default for RoutePaths {
    fn default() -> Self {
        RoutePaths::new("", "metrics")
    }
}

fn absolute(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState, paths: &RoutePaths) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route(&paths.webhook, post(webhook_handler))
        .route(&paths.metrics, get(metrics_handler))
        .route(HEALTH_PATH, get(health_handler))
        .with_state(app_state)
}


#[cfg(test)]
mod integration_tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tokio::task::JoinHandle;
    use tower::ServiceExt;

    use crate::events::PrAction;
    use crate::matcher::ContextRules;
    use crate::metrics::GithubMetrics;
    use crate::processor::{EventProcessor, spawn_processor};
    use crate::test_utils::{Observation, RecordingPublisher, repo};

    type Recorded = EventProcessor<Arc<RecordingPublisher>, ContextRules>;

    const HEAD: &str = "6dcb09b5b57875f334f61aebed695e2e4193db5e";

    /// Builds a router backed by a recording processor.
    fn test_app(secret: &[u8]) -> (axum::Router, Arc<RecordingPublisher>, JoinHandle<Recorded>) {
        let publisher = Arc::new(RecordingPublisher::new());
        let processor =
            EventProcessor::new(Arc::clone(&publisher), ContextRules::default_rules(), true);
        let (handle, task) = spawn_processor(processor, 8);
        let state = AppState::new(handle, WebhookSecret::new(secret), Registry::new());
        (build_router(state, &RoutePaths::default()), publisher, task)
    }

    /// Creates a webhook request, signed if `secret` is given.
    fn create_webhook_request(
        secret: Option<&[u8]>,
        event_type: &str,
        body: &serde_json::Value,
    ) -> Request<Body> {
        let body_bytes = serde_json::to_vec(body).unwrap();

        let mut builder = Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .header("x-github-event", event_type)
            .header("x-github-delivery", "550e8400-e29b-41d4-a716-446655440000");
        if let Some(secret) = secret {
            builder = builder.header(
                "x-hub-signature-256",
                WebhookSecret::new(secret).sign(&body_bytes),
            );
        }
        builder.body(Body::from(body_bytes)).unwrap()
    }

    fn pull_request_opened() -> serde_json::Value {
        json!({
            "action": "opened",
            "number": 7,
            "pull_request": {
                "head": { "sha": HEAD },
                "merged": false,
                "updated_at": "2024-01-15T12:00:00Z"
            },
            "repository": { "full_name": "octocat/hello-world" }
        })
    }

    async fn body_text(response: axum::response::Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    // ─── Health endpoint tests ───

    #[tokio::test]
    async fn health_returns_200() {
        let (app, _, _task) = test_app(b"secret");

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    // ─── Webhook endpoint tests ───

    #[tokio::test]
    async fn webhook_valid_returns_202_and_reaches_processor() {
        let secret: &[u8] = b"test-secret";
        let (app, publisher, task) = test_app(secret);

        let request = create_webhook_request(Some(secret), "pull_request", &pull_request_opened());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_text(response).await, "Accepted");

        // The router owned the last handle; the worker drains and exits.
        let processor = task.await.unwrap();
        assert_eq!(processor.live_count(), 1);
        assert_eq!(
            publisher.observations(),
            vec![Observation::PrEvent(repo(), PrAction::Opened)]
        );
    }

    #[tokio::test]
    async fn webhook_invalid_signature_returns_401() {
        let (app, publisher, task) = test_app(b"correct-secret");

        let request =
            create_webhook_request(Some(b"wrong-secret".as_slice()), "pull_request", &pull_request_opened());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        task.await.unwrap();
        assert!(publisher.observations().is_empty());
    }

    #[tokio::test]
    async fn webhook_missing_signature_returns_400() {
        let (app, _, _task) = test_app(b"secret");

        let request = create_webhook_request(None, "pull_request", &pull_request_opened());
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_without_secret_skips_verification() {
        let (app, publisher, task) = test_app(b"");

        let request = create_webhook_request(None, "pull_request", &pull_request_opened());
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        task.await.unwrap();
        assert_eq!(publisher.observations().len(), 1);
    }

    #[tokio::test]
    async fn webhook_missing_event_header_returns_400() {
        let (app, _, _task) = test_app(b"");

        let request = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(pull_request_opened().to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_malformed_payload_returns_400() {
        let secret: &[u8] = b"test-secret";
        let (app, _, _task) = test_app(secret);

        let body = json!({ "action": "opened", "repository": { "full_name": "octocat/hello-world" } });
        let request = create_webhook_request(Some(secret), "pull_request", &body);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn webhook_untracked_event_returns_200() {
        let secret: &[u8] = b"test-secret";
        let (app, publisher, task) = test_app(secret);

        let body = json!({ "zen": "Design for failure.", "hook_id": 1 });
        let request = create_webhook_request(Some(secret), "ping", &body);
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Ignored");
        task.await.unwrap();
        assert!(publisher.observations().is_empty());
    }

    #[tokio::test]
    async fn webhook_after_processor_stopped_returns_503() {
        let (app, _, task) = test_app(b"");
        task.abort();
        let _ = task.await;

        let request = create_webhook_request(None, "pull_request", &pull_request_opened());
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn webhook_wrong_method_returns_405() {
        let (app, _, _task) = test_app(b"");

        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    // ─── Metrics endpoint tests ───

    #[tokio::test]
    async fn deliveries_show_up_in_metrics() {
        let registry = Registry::new();
        let metrics = Arc::new(GithubMetrics::new(&registry).unwrap());
        let processor = EventProcessor::new(metrics, ContextRules::default_rules(), false);
        let (handle, task) = spawn_processor(processor, 8);
        let paths = RoutePaths::new("hooks", "prom");
        let app = build_router(
            AppState::new(handle, WebhookSecret::default(), registry),
            &paths,
        );

        let status_body = json!({
            "sha": HEAD,
            "state": "success",
            "context": "ci/circleci: all-jobs",
            "updated_at": "2024-01-15T12:01:00Z",
            "repository": { "full_name": "octocat/hello-world" }
        });
        let mut request = create_webhook_request(None, "status", &status_body);
        *request.uri_mut() = "/hooks".parse().unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        // The worker applies the update asynchronously; poll until it lands.
        let mut text = String::new();
        for _ in 0..100 {
            let request = Request::builder().uri("/prom").body(Body::empty()).unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            text = body_text(response).await;
            if text.contains("github_status_checks_total") {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert!(text.contains(
            "github_status_checks_total{repository=\"octocat/hello-world\",state=\"success\"} 1"
        ));
        drop(app);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn metrics_uses_prometheus_content_type() {
        let (app, _, _task) = test_app(b"");

        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            prometheus::TEXT_FORMAT
        );
    }
}
