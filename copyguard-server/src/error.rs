//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::pipeline::ScanError;
use crate::store::StoreError;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Not found - requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict - request cannot be applied to the current resource state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - storage or queue backend is unreachable
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Scan pipeline error surfaced at the API boundary
    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Scan(ref e) => match e {
                ScanError::NotFound(_) => StatusCode::NOT_FOUND,
                ScanError::AmbiguousContent(_) => StatusCode::CONFLICT,
                ScanError::InvalidHash(_) => StatusCode::BAD_REQUEST,
                ScanError::TransientPersistence(_) => StatusCode::SERVICE_UNAVAILABLE,
                ScanError::ExtractionFailure(_)
                | ScanError::PolicyEngine(_)
                | ScanError::LeaseBusy(_)
                | ScanError::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Scan(ref e) => match e {
                ScanError::NotFound(_) => "CONTENT_NOT_FOUND",
                ScanError::TransientPersistence(_) => "STORAGE_UNAVAILABLE",
                other => other.code(),
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Scan(ref e) => match e {
                ScanError::NotFound(what) => format!("Not found: {what}"),
                ScanError::AmbiguousContent(id) => format!(
                    "Content id {id} exists as both post and post meta; specify contentKind"
                ),
                ScanError::InvalidHash(msg) => format!("Invalid hash: {msg}"),
                ScanError::TransientPersistence(_) => "Storage temporarily unavailable".to_string(),
                _ => "Scan pipeline error".to_string(),
            },
            Self::Internal(_) => "Internal server error".to_string(),
            Self::ServiceUnavailable(_) => "Service temporarily unavailable".to_string(),
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Scan(_) => "scan",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Connection(msg) => Self::ServiceUnavailable(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<copyguard_core::CopyguardError> for ApiError {
    fn from(e: copyguard_core::CopyguardError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_client_error() {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        } else if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Service unavailable"
            );
        } else {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                client_message = %client_message,
                "Server error"
            );
        }

        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}
