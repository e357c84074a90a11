//! Fallback for unmatched routes

use axum::http::Uri;

use crate::AppError;

pub async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {}", uri.path()))
}
