//! Gateway error types with HTTP status code mapping.
//!
//! [`AppError`] is the central error type for the gateway. Each variant
//! maps to a numeric code, an HTTP status, and the severity it is recorded
//! with in the error log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::logs::ErrorLevel;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: title is required"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Details of an error response, attached to the response extensions so
/// the audit middleware can write the error log row with request context.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// Severity of the failure.
    pub level: ErrorLevel,
    /// Error category name (variant name).
    pub kind: &'static str,
    /// Full message, including details hidden from 5xx bodies.
    pub message: String,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category           | HTTP Status                  |
/// |-----------|--------------------|------------------------------|
/// | 1000–1999 | Validation         | 400 / 413                    |
/// | 2000–2999 | Access / State     | 401 / 403 / 404 / 409        |
/// | 3000–3999 | Server / Upstream  | 500 / 502                    |
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing, invalid or expired credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Requested entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The operation is not valid in the entity's current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A uniqueness rule would be violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request body or upload exceeds the configured limit.
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// The model runtime or another upstream service failed.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for [`AppError::NotFound`].
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Shorthand for [`AppError::InvalidRequest`].
    #[must_use]
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Shorthand for [`AppError::Forbidden`].
    #[must_use]
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidOperation(_) => 1002,
            Self::PayloadTooLarge(_) => 1003,
            Self::Unauthorized(_) => 2001,
            Self::Forbidden(_) => 2002,
            Self::NotFound(_) => 2003,
            Self::Conflict(_) => 2004,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Upstream(_) => 3002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Severity used when the error is written to the error log.
    #[must_use]
    pub const fn level(&self) -> ErrorLevel {
        match self {
            Self::InvalidOperation(_) => ErrorLevel::Error,
            Self::Persistence(_) | Self::Upstream(_) | Self::Internal(_) => ErrorLevel::Critical,
            _ => ErrorLevel::Warning,
        }
    }

    /// Category name recorded as the error type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "Unauthorized",
            Self::Forbidden(_) => "Forbidden",
            Self::NotFound(_) => "NotFound",
            Self::InvalidRequest(_) => "InvalidRequest",
            Self::InvalidOperation(_) => "InvalidOperation",
            Self::Conflict(_) => "Conflict",
            Self::PayloadTooLarge(_) => "PayloadTooLarge",
            Self::Persistence(_) => "Persistence",
            Self::Upstream(_) => "Upstream",
            Self::Internal(_) => "Internal",
        }
    }

    /// Message safe to return to the client. Server-side failures are
    /// replaced by a generic sentence; the detail stays in the error log.
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.status_code().is_server_error() {
            "An internal error occurred. Please try again later.".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.public_message(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response.extensions_mut().insert(ErrorReport {
            level: self.level(),
            kind: self.kind(),
            message: self.to_string(),
        });
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_error_category() {
        assert_eq!(
            AppError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::not_found("job post").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::invalid("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InvalidOperation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Persistence("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn levels_match_severity() {
        assert_eq!(AppError::invalid("x").level(), ErrorLevel::Warning);
        assert_eq!(AppError::InvalidOperation("x".into()).level(), ErrorLevel::Error);
        assert_eq!(AppError::Internal("x".into()).level(), ErrorLevel::Critical);
    }

    #[test]
    fn server_errors_hide_details() {
        let err = AppError::Persistence("relation users does not exist".into());
        assert!(!err.public_message().contains("relation"));
        let err = AppError::invalid("title is required");
        assert!(err.public_message().contains("title is required"));
    }

    #[test]
    fn response_carries_error_report() {
        let response = AppError::Internal("boom".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let Some(report) = response.extensions().get::<ErrorReport>() else {
            panic!("error report missing");
        };
        assert_eq!(report.kind, "Internal");
        assert!(report.message.contains("boom"));
    }
}
