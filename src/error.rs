use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors surfaced by the room timer protocol.
#[derive(Debug, Error)]
pub enum TimerError {
    /// Empty room code, or a duration outside the accepted range.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The shared store could not be reached; the operation was not retried.
    #[error("room store disconnected")]
    Disconnected(#[from] StorageError),
    /// The countdown record could not be encoded for the store.
    #[error("failed to encode room record")]
    Encode(#[from] serde_json::Error),
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TimerError> for AppError {
    fn from(err: TimerError) -> Self {
        match err {
            TimerError::InvalidInput(message) => AppError::BadRequest(message),
            TimerError::Disconnected(source) => AppError::ServiceUnavailable(source.to_string()),
            TimerError::Encode(source) => AppError::Internal(source.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}
