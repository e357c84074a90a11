//! Scoring handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::Value;

use crate::models::PredictionResponse;
use crate::scoring::ScoringError;
use crate::{AppError, AppResult, AppState};

/// Score one transaction
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<PredictionResponse>> {
    let Json(body) = payload?;

    // Model execution is CPU-bound and may wait on the session lock
    let pipeline = state.pipeline.clone();
    let prediction = tokio::task::spawn_blocking(move || pipeline.predict(&body))
        .await
        .map_err(|e| AppError::Scoring(ScoringError::Backend(format!("scoring task failed: {}", e))))??;

    Ok(Json(prediction))
}
