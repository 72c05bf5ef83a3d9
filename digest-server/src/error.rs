//! Error types for the HTTP surface

use crate::backend::BackendError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// Message used when the proxy error carries no text of its own
pub const PROXY_FALLBACK_MESSAGE: &str = "Failed to connect to backend";

/// API error type
#[derive(Debug)]
pub enum ApiError {
    /// No acceptable credential (401)
    Unauthorized,

    /// Upstream unreachable or its body unreadable (502)
    Proxy(String),

    /// Bad request (400)
    BadRequest(String),

    /// Not found (404)
    NotFound(String),

    /// Internal server error (500)
    Internal(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),

    /// Typed backend client error
    Backend(BackendError),
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// Error envelope shared with the backend: `{"error":{"code","message"}}`
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl ApiError {
    /// Build a proxy error, falling back to a generic message when empty
    pub fn proxy(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.trim().is_empty() {
            ApiError::Proxy(PROXY_FALLBACK_MESSAGE.to_string())
        } else {
            ApiError::Proxy(message)
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Proxy(_) => StatusCode::BAD_GATEWAY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Backend(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::Proxy(msg) => write!(f, "Proxy error: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::Backend(e) => write!(f, "Backend error: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<BackendError> for ApiError {
    fn from(err: BackendError) -> Self {
        ApiError::Backend(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            // The gate's deny body is a bare string, not the envelope
            ApiError::Unauthorized => {
                return (status, Json(json!({ "error": "unauthorized" }))).into_response();
            }
            ApiError::Proxy(msg) => ("PROXY_ERROR", msg),
            ApiError::BadRequest(msg) => ("BAD_REQUEST", msg),
            ApiError::NotFound(msg) => ("NOT_FOUND", msg),
            ApiError::Internal(msg) => ("INTERNAL_ERROR", msg),
            ApiError::ServiceUnavailable(msg) => ("SERVICE_UNAVAILABLE", msg),
            ApiError::Backend(e) => ("BACKEND_ERROR", e.to_string()),
        };

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}
