//! HTTP handlers and error responses.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check endpoint
//! - anything else not claimed by the image middleware - JSON 404

use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{ImageError, SignatureError};

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "invalid_signature")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    /// Create a new error response.
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a new error response with status code.
    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

impl ImageError {
    /// HTTP status used when this error is rendered.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ImageError::SourceNotFound { .. } => StatusCode::NOT_FOUND,
            ImageError::TransformFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ImageError::Signature(SignatureError::Malformed) => StatusCode::BAD_REQUEST,
            ImageError::Signature(_) => StatusCode::UNAUTHORIZED,
            ImageError::CachedImageNotFound { .. } | ImageError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Convert ImageError to HTTP response.
///
/// - 5xx errors are logged at ERROR level
/// - 404s are logged at DEBUG level
/// - other 4xx errors are logged at WARN level
impl IntoResponse for ImageError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_type = self.kind();
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// JSON 404 for requests no route or middleware claimed.
pub async fn fallback_handler(uri: Uri) -> Response {
    debug!(path = %uri.path(), "No route matched");
    let error_response = ErrorResponse::with_status(
        "not_found",
        format!("No route for {}", uri.path()),
        StatusCode::NOT_FOUND,
    );
    (StatusCode::NOT_FOUND, Json(error_response)).into_response()
}

// =============================================================================
// Tests
// =============================================================================
