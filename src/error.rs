//! Error handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::{FieldError, ValidationError};
use crate::scoring::{PipelineError, ScoringError};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Client errors
    Validation(ValidationError),
    NotFound(String),

    // Server errors
    Scoring(ScoringError),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details): (StatusCode, String, Option<&[FieldError]>) =
            match &self {
                AppError::Validation(err) => {
                    tracing::debug!("Rejected request: {}", err);
                    let details = match err {
                        ValidationError::Fields(fields) => Some(fields.as_slice()),
                        ValidationError::InvalidBody(_) => None,
                    };
                    (StatusCode::UNPROCESSABLE_ENTITY, err.to_string(), details)
                }
                AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
                AppError::Scoring(err) => {
                    tracing::error!("Scoring error: {}", err);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Scoring backend error".to_string(),
                        None,
                    )
                }
                AppError::Internal(msg) => {
                    tracing::error!("Internal error: {}", msg);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal server error".to_string(),
                        None,
                    )
                }
            };

        let mut body = json!({
            "error": error_message,
            "status": status.as_u16()
        });
        if let Some(details) = details {
            body["details"] = json!(details);
        }

        (status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(e) => AppError::Validation(e),
            PipelineError::Scoring(e) => AppError::Scoring(e),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(ValidationError::InvalidBody(rejection.body_text()))
    }
}

impl From<prometheus::Error> for AppError {
    fn from(err: prometheus::Error) -> Self {
        AppError::Internal(format!("metrics exposition failed: {}", err))
    }
}
