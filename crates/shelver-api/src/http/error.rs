//! Application error type mapping to HTTP status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use shelver_types::error::{BatchError, OrganizeError};
use shelver_types::llm::LlmError;

/// Application-level error that maps to HTTP responses.
///
/// The async path never surfaces downstream errors here; they travel in the
/// callback payload. This type covers the synchronous organize path and the
/// submit entry point.
#[derive(Debug)]
pub enum AppError {
    Organize(OrganizeError),
    Batch(BatchError),
}

impl From<OrganizeError> for AppError {
    fn from(e: OrganizeError) -> Self {
        AppError::Organize(e)
    }
}

impl From<BatchError> for AppError {
    fn from(e: BatchError) -> Self {
        AppError::Batch(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Organize(OrganizeError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Organize(OrganizeError::TooLarge { actual, limit }) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "REQUEST_TOO_LARGE",
                format!("request is {actual} bytes, limit is {limit}"),
            ),
            AppError::Organize(OrganizeError::Llm(LlmError::Transient(msg))) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "PROVIDER_UNAVAILABLE",
                msg.clone(),
            ),
            AppError::Organize(OrganizeError::Llm(e)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PROVIDER_ERROR",
                e.to_string(),
            ),
            AppError::Organize(OrganizeError::BadResponse(msg)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "BAD_MODEL_RESPONSE",
                msg.clone(),
            ),
            AppError::Organize(OrganizeError::Sanitize(e)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "BAD_MODEL_RESPONSE",
                e.to_string(),
            ),
            AppError::Batch(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "BATCH_ERROR",
                e.to_string(),
            ),
        };

        let body = json!({
            "error": {
                "code": code,
                "message": message,
            }
        });

        (status, axum::Json(body)).into_response()
    }
}
