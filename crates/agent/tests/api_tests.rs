//! Integration tests for the agent API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use slack_agent::api::{create_router, AppState};
use slack_lib::{
    health::{components, HealthRegistry},
    observability::PipelineMetrics,
    QosDecision, ResourceEstimate, ResourceKind, TickOutput,
};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::INGEST).await;
    health_registry.register(components::PIPELINE).await;

    let state = Arc::new(AppState::new(health_registry, PipelineMetrics::new()));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["ingest"].is_object());
    assert!(health["components"]["pipeline"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_pipeline_degraded() {
    let (app, state) = setup_test_app().await;
    state.health_registry.record_run(3, None).await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["components"]["pipeline"]["status"], "degraded");
}

#[tokio::test]
async fn test_healthz_returns_503_when_ingest_unhealthy() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_unhealthy(components::INGEST, "Report stream failed")
        .await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_tracks_initialization() {
    let (app, state) = setup_test_app().await;

    let (status, body) = get(app.clone(), "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);

    state.health_registry.set_ready(true).await;
    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_ready_but_unhealthy() {
    let (app, state) = setup_test_app().await;
    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_unhealthy(components::INGEST, "Failed")
        .await;

    let (status, _) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_estimates_empty_before_first_run() {
    let (app, _state) = setup_test_app().await;
    let (status, body) = get(app, "/estimates").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn test_estimates_returns_latest_output() {
    let (app, state) = setup_test_app().await;
    state
        .publish(TickOutput {
            timestamp: 12.0,
            estimates: vec![ResourceEstimate::revocable(ResourceKind::Cpu, 2.5, "*")],
            decisions: vec![QosDecision::Continue],
            flags: Vec::new(),
            failures: Vec::new(),
        })
        .await;

    let (status, body) = get(app, "/estimates").await;
    assert_eq!(status, StatusCode::OK);

    let output: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(output["timestamp"], 12.0);
    assert_eq!(output["estimates"][0]["kind"], "cpu");
    assert_eq!(output["estimates"][0]["value"], 2.5);
    assert_eq!(output["estimates"][0]["revocable"], true);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;

    state.metrics.observe_run(0.0002);
    state.metrics.observe_run(0.003);
    state
        .metrics
        .set_estimates(&[ResourceEstimate::revocable(ResourceKind::Cpu, 2.5, "*")]);
    state.metrics.record_decisions(&[QosDecision::Continue]);
    state.metrics.set_executors_tracked(2);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("slack_pipeline_run_latency_seconds_bucket"));
    assert!(metrics_text.contains("slack_pipeline_run_latency_seconds_count"));
    assert!(metrics_text.contains("slack_pipeline_runs_total"));
    assert!(metrics_text.contains("slack_pipeline_estimate{kind=\"cpu\"} 2.5"));
    assert!(metrics_text.contains("slack_pipeline_qos_decisions_total{action=\"continue\"}"));
    assert!(metrics_text.contains("slack_pipeline_executors_tracked"));
}
