//! Health check handler

use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

/// Liveness only; touches neither the model nor the metrics store
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "running" })
}
