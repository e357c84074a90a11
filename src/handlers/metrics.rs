//! Metrics scrape handler

use axum::{extract::State, http::header, response::IntoResponse};

use crate::{AppResult, AppState};

/// Scoring aggregates followed by request instrumentation
pub async fn scrape(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let mut body = state.metrics.render()?;
    body.push_str(&state.prometheus.render());

    Ok(([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body))
}
