//! Error types for the gateway HTTP surface
//!
//! This module defines the structured error response for the API layer:
//! - `ApiError` struct serialized as JSON on every failure
//! - `ErrorCode` enum for categorizing errors
//! - `IntoResponse` implementation for Axum
//!
//! Propagation policy: cache and audit failures are absorbed by their
//! components and never become an `ApiError`; backend failures either
//! degrade to fallback data or surface here; anything unclassified becomes
//! `InternalError` with a generic client-facing message while the full
//! detail goes to tracing only.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Client errors (400, 401, 403, 429)
    // ========================================================================
    /// Request validation failed
    ValidationFailed,

    /// Required field is missing from request
    MissingField,

    /// Request lacks valid authentication credentials
    Unauthorized,

    /// Request is authenticated but lacks permission for the resource
    Forbidden,

    /// Quota exceeded or client denylisted
    RateLimited,

    // ========================================================================
    // Upstream errors (502, 503, 504)
    // ========================================================================
    /// Inventory backend unreachable; fallback data applies
    UpstreamUnavailable,

    /// Inventory backend exceeded its deadline; fallback data applies
    UpstreamTimeout,

    /// Inventory backend responded with an application error, surfaced as-is
    UpstreamError,

    // ========================================================================
    // Server errors (500)
    // ========================================================================
    /// Unexpected internal failure
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed | ErrorCode::MissingField => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::UpstreamUnavailable | ErrorCode::UpstreamTimeout => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorCode::UpstreamError => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::RateLimited => "Rate limit exceeded",
            ErrorCode::UpstreamUnavailable => "Inventory service temporarily unavailable",
            ErrorCode::UpstreamTimeout => "Inventory service timed out",
            ErrorCode::UpstreamError => "Inventory service returned an error",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (fallback data, upstream body, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self {
            code,
            message: code.default_message().to_string(),
            details: None,
        }
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn rate_limited(retry_after_secs: Option<u64>) -> Self {
        let message = match retry_after_secs {
            Some(secs) => format!("Rate limit exceeded. Retry after {} seconds", secs),
            None => "Rate limit exceeded".to_string(),
        };
        Self::new(ErrorCode::RateLimited, message)
    }

    pub fn upstream_unavailable() -> Self {
        Self::from_code(ErrorCode::UpstreamUnavailable)
    }

    pub fn upstream_timeout() -> Self {
        Self::from_code(ErrorCode::UpstreamTimeout)
    }

    /// Backend responded with an error status; its status and body ride in
    /// the details so nothing is lost.
    pub fn upstream_error(status: u16, body: serde_json::Value) -> Self {
        Self::new(
            ErrorCode::UpstreamError,
            format!("Inventory service responded with HTTP {}", status),
        )
        .with_details(serde_json::json!({
            "upstream_status": status,
            "upstream_body": body,
        }))
    }

    /// Generic internal error. The client-facing message stays generic;
    /// callers log the real cause before constructing this.
    pub fn internal_error() -> Self {
        Self::from_code(ErrorCode::InternalError)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<stockgate_core::ValidationError> for ApiError {
    fn from(err: stockgate_core::ValidationError) -> Self {
        match err {
            stockgate_core::ValidationError::RequiredFieldMissing { field } => {
                ApiError::missing_field(&field)
            }
            stockgate_core::ValidationError::InvalidValue { field, reason } => {
                ApiError::validation_failed(format!("Invalid value for '{}': {}", field, reason))
            }
        }
    }
}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::MissingField.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ErrorCode::RateLimited.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ErrorCode::UpstreamUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::UpstreamTimeout.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(ErrorCode::UpstreamError.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_field_message() {
        let err = ApiError::missing_field("product_id");
        assert_eq!(err.code, ErrorCode::MissingField);
        assert!(err.message.contains("product_id"));
    }

    #[test]
    fn test_upstream_error_carries_body() {
        let err = ApiError::upstream_error(422, serde_json::json!({ "error": "bad sku" }));
        let details = err.details.expect("details");
        assert_eq!(details["upstream_status"], 422);
        assert_eq!(details["upstream_body"]["error"], "bad sku");
    }

    #[test]
    fn test_internal_error_is_generic() {
        let err = ApiError::internal_error();
        assert_eq!(err.message, "Internal server error");
        assert!(err.details.is_none());
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::rate_limited(Some(60));
        let json = serde_json::to_string(&err)?;
        assert!(json.contains("RATE_LIMITED"));
        let back: ApiError = serde_json::from_str(&json)?;
        assert_eq!(back, err);
        Ok(())
    }
}
