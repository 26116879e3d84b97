use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::batch::QueueError;
use crate::storage::DatabaseError;

/// Errors returned by the HTTP handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body was not the expected JSON
    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Failed to queue batch job: {0}")]
    Queue(#[from] QueueError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Body problems on the trigger endpoint are reported as setup
        // failures (500), the same as a queue failure.
        let error = match &self {
            ApiError::InvalidBody(e) => {
                tracing::warn!(error = %e, "Rejected batch request body");
                "Failed to start batch"
            }
            ApiError::Queue(e) => {
                tracing::error!(error = %e, "Failed to queue batch job");
                "Failed to start batch"
            }
            ApiError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                "Database error"
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details: Some(self.to_string()),
        };

        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
