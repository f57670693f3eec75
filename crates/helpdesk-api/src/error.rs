//! API error types and JSON error response formatting.
//!
//! Service errors are mapped onto status codes here and nowhere else, so
//! every endpoint reports the same taxonomy the same way.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use helpdesk_core::error::HelpdeskError;

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "not_found").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 - malformed body or a request the chat's state forbids.
    BadRequest(String),
    /// 404 - company, chat, ticket, client or helper missing.
    NotFound(String),
    /// 409 - duplicate identifier or a concurrent write won.
    Conflict(String),
    /// 502 - engine or summarizer failure that could not be absorbed.
    BadGateway(String),
    /// 500 - the store did not apply the write.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

impl From<HelpdeskError> for ApiError {
    fn from(err: HelpdeskError) -> Self {
        let message = err.to_string();
        match err {
            HelpdeskError::NotFound { .. } => ApiError::NotFound(message),
            HelpdeskError::Conflict(_) | HelpdeskError::StaleVersion { .. } => {
                ApiError::Conflict(message)
            }
            HelpdeskError::InvalidState(_) => ApiError::BadRequest(message),
            HelpdeskError::Upstream(_) => ApiError::BadGateway(message),
            _ => {
                tracing::error!(error = %message, "Request failed");
                ApiError::Internal(message)
            }
        }
    }
}
