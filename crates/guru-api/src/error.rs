//! API error types and JSON error response formatting.
//!
//! Every failure is reported as `{"error": ..., "details"?: ...}` with a
//! status code derived from the error class.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use guru_chat::{ChatError, ErrorKind};

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable error summary.
    pub error: String,
    /// Underlying cause, for upstream failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 Bad Request - malformed body or invalid input.
    BadRequest(String),
    /// 401 Unauthorized - caller not on the allow-list.
    Unauthorized(String),
    /// 500 - the model call or its configuration failed.
    Upstream { error: String, details: String },
    /// 500 Internal Server Error - unexpected server error.
    Internal(String),
}

impl ApiError {
    /// Map a pipeline error. `label` becomes the `error` field of non-validation
    /// failures, e.g. "Failed to process chat request".
    pub fn from_chat(err: ChatError, label: &str) -> Self {
        match err.kind() {
            ErrorKind::Validation => ApiError::BadRequest(err.to_string()),
            ErrorKind::Upstream | ErrorKind::Persistence => ApiError::Upstream {
                error: label.to_string(),
                details: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::Upstream { error, details } => {
                (StatusCode::INTERNAL_SERVER_ERROR, error, Some(details))
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, None),
        };

        (status, Json(ErrorBody { error, details })).into_response()
    }
}

impl From<guru_core::error::GuruError> for ApiError {
    fn from(err: guru_core::error::GuruError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
