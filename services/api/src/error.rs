//! services/api/src/error.rs
//!
//! Defines the error types of the API service: `ApiError` for startup and
//! `AppError` for everything a request handler can fail with.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use newswatcher_core::{PortError, ValidationError};
use serde_json::json;
use tracing::{error, info, warn};

/// The primary error type for starting and running the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error while applying database migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

//=========================================================================================
// Request Errors
//=========================================================================================

/// Everything a handler can fail with. Each variant carries a fixed HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    InvalidInput(String),
    /// The reason is detail only; clients always see the same message.
    #[error("User is not logged in.")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("User was not found.")]
    UserNotFound,
    #[error("Wrong password")]
    WrongPassword,
    #[error("Email account already registered")]
    EmailTaken,
    #[error("Too many news filters (maximum {0})")]
    TooManyFilters(usize),
    #[error("{0}")]
    NotFound(String),
    #[error("Over the save limit, or story already saved")]
    SaveLimitReached,
    #[error("Shared story limit reached")]
    ShareLimitReached,
    #[error("Story was already shared")]
    AlreadyShared,
    #[error("Comment limit reached")]
    CommentLimitReached,
    #[error("Account deletion failure")]
    AccountDeletionFailure,
    #[error("Shared story deletion failure")]
    DeletionFailure,
    #[error("Conditional update matched nothing: {0}")]
    ContentionFailure(String),
    #[error("Too many requests, please try again later")]
    RateLimited,
    #[error("Request timed out")]
    Timeout,
    #[error("Request body is too large")]
    PayloadTooLarge(String),
    #[error("Store operation failed")]
    StoreFailure(String),
    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::NOT_ACCEPTABLE,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::UserNotFound => {
                StatusCode::PROXY_AUTHENTICATION_REQUIRED
            }
            AppError::WrongPassword | AppError::TooManyFilters(_) => StatusCode::REQUEST_TIMEOUT,
            AppError::EmailTaken => StatusCode::METHOD_NOT_ALLOWED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SaveLimitReached
            | AppError::ShareLimitReached
            | AppError::AlreadyShared
            | AppError::CommentLimitReached
            | AppError::AccountDeletionFailure
            | AppError::DeletionFailure
            | AppError::ContentionFailure(_) => StatusCode::CONFLICT,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::StoreFailure(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// A stable machine-readable name for the error.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::Unauthenticated(_) => "Unauthenticated",
            AppError::Forbidden(_) => "Forbidden",
            AppError::UserNotFound => "UserNotFound",
            AppError::WrongPassword => "WrongPassword",
            AppError::EmailTaken => "Conflict",
            AppError::TooManyFilters(_) => "TooManyFilters",
            AppError::NotFound(_) => "NotFound",
            AppError::SaveLimitReached => "SaveLimitReached",
            AppError::ShareLimitReached => "ShareLimitReached",
            AppError::AlreadyShared => "AlreadyShared",
            AppError::CommentLimitReached => "CommentLimitReached",
            AppError::AccountDeletionFailure => "AccountDeletionFailure",
            AppError::DeletionFailure => "DeletionFailure",
            AppError::ContentionFailure(_) => "ContentionFailure",
            AppError::RateLimited => "RateLimited",
            AppError::Timeout => "Timeout",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::StoreFailure(_) => "StoreFailure",
            AppError::Internal(_) => "Internal",
        }
    }

    fn is_contention(&self) -> bool {
        matches!(
            self,
            AppError::AccountDeletionFailure
                | AppError::DeletionFailure
                | AppError::ContentionFailure(_)
        )
    }

    /// Internal detail that is only shown outside production.
    fn detail(&self) -> String {
        match self {
            AppError::Unauthenticated(detail)
            | AppError::PayloadTooLarge(detail)
            | AppError::StoreFailure(detail)
            | AppError::Internal(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<PortError> for AppError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => AppError::NotFound(msg),
            PortError::Conflict(msg) => AppError::ContentionFailure(msg),
            PortError::Unauthorized => {
                AppError::Unauthenticated("store refused the session".into())
            }
            PortError::Unexpected(msg) => AppError::StoreFailure(msg),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

/// Attached to every error response so the error responder middleware can
/// re-render the body with full detail outside production.
#[derive(Clone, Debug)]
pub struct ErrorReport {
    pub message: String,
    pub kind: &'static str,
    pub detail: String,
}

impl ErrorReport {
    pub fn body(&self, production: bool) -> serde_json::Value {
        if production {
            json!({ "message": self.message, "error": {} })
        } else {
            json!({
                "message": self.message,
                "error": { "kind": self.kind, "detail": self.detail }
            })
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), detail = %self.detail(), "request failed");
        } else if self.is_contention() {
            warn!(kind = self.kind(), "possible write contention: {}", self);
        } else {
            info!(kind = self.kind(), status = status.as_u16(), "request rejected: {}", self);
        }

        let report = ErrorReport {
            message: self.to_string(),
            kind: self.kind(),
            detail: self.detail(),
        };
        // The safe production body is the default; the responder may enrich it.
        let mut response = (status, Json(report.body(true))).into_response();
        response.extensions_mut().insert(report);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_table() {
        assert_eq!(AppError::InvalidInput("x".into()).status().as_u16(), 406);
        assert_eq!(AppError::Forbidden("x".into()).status().as_u16(), 407);
        assert_eq!(AppError::UserNotFound.status().as_u16(), 407);
        assert_eq!(AppError::WrongPassword.status().as_u16(), 408);
        assert_eq!(AppError::TooManyFilters(10).status().as_u16(), 408);
        assert_eq!(AppError::EmailTaken.status().as_u16(), 405);
        assert_eq!(AppError::Unauthenticated("x".into()).status().as_u16(), 401);
        assert_eq!(AppError::StoreFailure("x".into()).status().as_u16(), 500);
    }

    #[test]
    fn unauthenticated_reason_is_detail_only() {
        let err = AppError::Unauthenticated("ExpiredSignature".into());
        assert_eq!(err.to_string(), "User is not logged in.");
        assert_eq!(err.detail(), "ExpiredSignature");
        assert_eq!(AppError::Timeout.status().as_u16(), 408);
        assert_eq!(AppError::PayloadTooLarge("x".into()).status().as_u16(), 413);
    }

    #[test]
    fn production_body_hides_detail() {
        let report = ErrorReport {
            message: "Store operation failed".into(),
            kind: "StoreFailure",
            detail: "connection reset".into(),
        };
        assert_eq!(report.body(true)["error"], json!({}));
        assert_eq!(report.body(false)["error"]["detail"], "connection reset");
    }

    #[test]
    fn port_errors_map_to_request_errors() {
        let err: AppError = PortError::Unexpected("boom".into()).into();
        assert!(matches!(err, AppError::StoreFailure(_)));
        let err: AppError = PortError::NotFound("gone".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
