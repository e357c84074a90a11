//! Fraud Scoring Service
//!
//! Serves a registry-backed fraud model behind a single HTTP endpoint and
//! exposes scoring aggregates for Prometheus.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  FRAUD SCORING SERVICE                   │
//! ├──────────────────────────────────────────────────────────┤
//! │  POST /predict ─▶ Validator ─▶ Pipeline ─▶ FraudScorer   │
//! │                                   │        (ONNX model)  │
//! │                                   ▼                      │
//! │  GET /metrics ◀──────────── MetricsStore                 │
//! │                                                          │
//! │  startup: RegistryClient ─▶ MLflow ─▶ model.onnx         │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod scoring;
pub mod telemetry;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};

use scoring::ScoringPipeline;
use telemetry::MetricsStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: ScoringPipeline,
    pub metrics: Arc<MetricsStore>,
    pub prometheus: PrometheusHandle,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::health::check))
        .route("/predict", post(handlers::predict::predict))
        .route("/metrics", get(handlers::metrics::scrape))
        .fallback(handlers::fallback::not_found)
        .layer(axum_middleware::from_fn(middleware::instrument::track_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::models::FeatureVector;
    use crate::scoring::{FraudScorer, ScoringError};

    struct FixedScorer(f64);

    impl FraudScorer for FixedScorer {
        fn score(&self, _features: &FeatureVector) -> Result<f64, ScoringError> {
            Ok(self.0)
        }
    }

    struct BrokenScorer;

    impl FraudScorer for BrokenScorer {
        fn score(&self, _features: &FeatureVector) -> Result<f64, ScoringError> {
            Err(ScoringError::Backend("backend exploded".to_string()))
        }
    }

    fn app_with(scorer: impl FraudScorer + 'static) -> (Router, Arc<MetricsStore>) {
        let metrics = Arc::new(MetricsStore::new().unwrap());
        let state = AppState {
            pipeline: ScoringPipeline::new(Arc::new(scorer), metrics.clone()),
            metrics: metrics.clone(),
            prometheus: telemetry::detached_handle().unwrap(),
        };
        (create_router(state), metrics)
    }

    fn transaction(amount: f64) -> Value {
        json!({
            "transaction_amount": amount,
            "account_age_days": 365,
            "transactions_last_24h": 2,
            "merchant_risk_score": 0.4,
            "device_risk_score": 0.2
        })
    }

    async fn post_json(app: &Router, body: &Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_text(app: &Router, uri: &str) -> (StatusCode, String) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app_with(BrokenScorer);
        let (status, body) = get_text(&app, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"status": "running"}));
    }

    #[tokio::test]
    async fn test_predict_updates_metrics() {
        let (app, metrics) = app_with(FixedScorer(0.1));
        for amount in [100.0, 200.0, 300.0] {
            let (status, body) = post_json(&app, &transaction(amount)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({"fraud_probability": 0.1}));
        }

        assert_eq!(metrics.total_transactions(), 3);
        assert_eq!(metrics.avg_transaction_amount(), 200.0);
    }

    #[tokio::test]
    async fn test_predict_high_risk() {
        let (app, metrics) = app_with(FixedScorer(0.95));
        let (status, body) = post_json(&app, &transaction(75.0)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"fraud_probability": 0.95}));
        assert_eq!(metrics.high_risk_transactions(), 1);
    }

    #[tokio::test]
    async fn test_predict_missing_field() {
        let (app, metrics) = app_with(FixedScorer(0.5));
        let mut body = transaction(10.0);
        body.as_object_mut().unwrap().remove("merchant_risk_score");

        let (status, resp) = post_json(&app, &body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(resp["status"], 422);
        assert_eq!(
            resp["details"],
            json!([{"field": "merchant_risk_score", "reason": "missing"}])
        );
        assert_eq!(metrics.total_transactions(), 0);
    }

    #[tokio::test]
    async fn test_predict_malformed_json() {
        let (app, metrics) = app_with(FixedScorer(0.5));
        let req = Request::builder()
            .method("POST")
            .uri("/predict")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();

        assert!(resp.status().is_client_error());
        assert_eq!(metrics.total_transactions(), 0);
    }

    #[tokio::test]
    async fn test_predict_backend_failure() {
        let (app, metrics) = app_with(BrokenScorer);
        let (status, body) = post_json(&app, &transaction(10.0)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], 500);
        assert_eq!(
            metrics.render().unwrap(),
            MetricsStore::new().unwrap().render().unwrap()
        );
    }

    #[tokio::test]
    async fn test_metrics_exposition() {
        let (app, _) = app_with(FixedScorer(0.9));
        post_json(&app, &transaction(40.0)).await;

        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], prometheus::TEXT_FORMAT);

        let (_, text) = get_text(&app, "/metrics").await;
        assert!(text.contains("total_transactions_total 1\n"));
        assert!(text.contains("high_risk_transactions_total 1\n"));
        assert!(text.contains("fraud_score_distribution_count 1\n"));
        assert!(text.contains("avg_transaction_amount 40\n"));
    }

    #[tokio::test]
    async fn test_predict_negative_amount() {
        let (app, metrics) = app_with(FixedScorer(0.5));
        let (status, resp) = post_json(&app, &transaction(-500.0)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            resp["details"],
            json!([{"field": "transaction_amount", "reason": "invalid_type"}])
        );
        assert_eq!(metrics.total_transactions(), 0);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (app, _) = app_with(FixedScorer(0.5));
        let (status, body) = get_text(&app, "/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["status"], 404);
    }
}
