use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cinelock_core::CoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    ValidationError(String),
    #[error("not found: {0}")]
    NotFoundError(String),
    /// Lock store unreachable; the caller may retry
    #[error("service unavailable: {0}")]
    UnavailableError(String),
    #[error("internal error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::UnavailableError(msg) => {
                tracing::warn!("Lock store unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, "Seat reservations are temporarily unavailable, please retry".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidRequest(msg) => AppError::ValidationError(msg),
            CoreError::StoreUnavailable(msg) => AppError::UnavailableError(msg),
            CoreError::CorruptRecord(msg) => AppError::InternalServerError(msg),
        }
    }
}
