//! # Error Handling and Response Types
//!
//! Errors that can reach the HTTP surface or the binary boundary. Upstream
//! failures never end up here: the resolver absorbs them (see
//! [`crate::upstream::UpstreamError`]) and reports a plain not-found instead.
//!
//! ## Error Response Format
//!
//! ```json
//! {
//!   "error": "Not found",
//!   "code": "not_found",
//!   "details": null,
//!   "timestamp": "2024-01-01T12:00:00Z"
//! }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;

use crate::config::ConfigError;

/// Standardized error response structure for consistent API error handling
#[derive(Serialize, Debug)]
pub struct ApiErrorResponse {
    pub error: String,          // Human-readable error message
    pub code: String,           // Machine-readable error code
    pub details: Option<Value>, // Additional error details
    pub timestamp: String,      // ISO 8601 timestamp
}

/// Error code classification for machine-readable error types
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    ConfigError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::NotFound => "not_found",
            ErrorCode::ConfigError => "config_error",
            ErrorCode::InternalError => "internal_error",
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ConfigError | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Application-specific error types with error codes
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Get the appropriate error code for this error type
    pub fn error_code(&self) -> ErrorCode {
        match self {
            AppError::Json(_) => ErrorCode::ValidationError,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::Config(_) => ErrorCode::ConfigError,
            AppError::Io(_) | AppError::InternalError(_) => ErrorCode::InternalError,
        }
    }

    /// Get additional error details if available
    pub fn details(&self) -> Option<Value> {
        match self {
            AppError::Config(ConfigError::InvalidRegistryUrl { url, .. }) => {
                Some(serde_json::json!({ "url": url }))
            }
            AppError::Config(ConfigError::InvalidAddress { address, .. }) => {
                Some(serde_json::json!({ "address": address }))
            }
            _ => None,
        }
    }

    /// Create a standardized error response
    pub fn to_error_response(&self) -> ApiErrorResponse {
        let code = self.error_code();
        ApiErrorResponse {
            error: self.to_string(),
            code: code.as_str().to_string(),
            details: self.details(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_response = self.to_error_response();
        let status = self.error_code().http_status();

        // 404s are ordinary gateway traffic; only server-side failures are errors.
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        tracing::debug!(status = %status, code = %error_response.code, "Returning standardized error response");

        (status, axum::Json(error_response)).into_response()
    }
}

/// Convenient result type for application operations.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_map_to_status() {
        assert_eq!(
            AppError::NotFound("Not found".into()).error_code().http_status(),
            StatusCode::NOT_FOUND
        );
        let json_error = serde_json::from_str::<Value>("{").unwrap_err();
        assert_eq!(
            AppError::Json(json_error).error_code(),
            ErrorCode::ValidationError
        );
        assert_eq!(
            AppError::Config(ConfigError::NoRegistries).error_code().http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_not_found_body_carries_plain_message() {
        let body = AppError::NotFound("Not found".into()).to_error_response();
        assert_eq!(body.error, "Not found");
        assert_eq!(body.code, "not_found");
        assert!(body.details.is_none());
    }
}
