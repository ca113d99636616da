//! Error handling for the Dairy ERP backend
//!
//! Every error leaves the server as `{ "message", "code", "field"? }`. Server
//! side failures keep their detail in the log only.

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{MonthParseError, TransitionError};
use thiserror::Error;

/// PostgreSQL SQLSTATE for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions: requires {0}")]
    InsufficientPermissions(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Conflicts
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a field-level validation failure
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Turn a unique-key violation into a conflict on a named field; other
    /// errors pass through
    pub fn on_duplicate(self, field: &str, message: impl Into<String>) -> Self {
        match self {
            AppError::DuplicateEntry(_) => AppError::Conflict {
                resource: field.to_string(),
                message: message.into(),
            },
            other => other,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InsufficientPermissions(_) => StatusCode::FORBIDDEN,
            AppError::Validation { .. }
            | AppError::ValidationError(_)
            | AppError::InvalidStateTransition(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DuplicateEntry(_) | AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db.constraint().unwrap_or("unique key").to_string();
                return AppError::DuplicateEntry(constraint);
            }
        }
        AppError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.iter().collect();
        fields.sort_by_key(|(name, _)| **name);

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field));
                AppError::validation(field.to_string(), message)
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

impl From<MonthParseError> for AppError {
    fn from(err: MonthParseError) -> Self {
        AppError::validation("month", err.to_string())
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::InvalidStateTransition(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::validation("body", rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::validation("query", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::validation("path", rejection.body_text())
    }
}

/// Error response structure
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.to_string(),
            field: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let body = match &self {
            AppError::Unauthorized(msg) => ErrorResponse::new("UNAUTHORIZED", msg.clone()),
            AppError::InsufficientPermissions(capability) => ErrorResponse::new(
                "INSUFFICIENT_PERMISSIONS",
                format!("You do not have permission to perform this action ({})", capability),
            ),
            AppError::Validation { field, message } => ErrorResponse {
                message: message.clone(),
                code: "VALIDATION_ERROR".to_string(),
                field: Some(field.clone()),
            },
            AppError::ValidationError(msg) => ErrorResponse::new("VALIDATION_ERROR", msg.clone()),
            AppError::InvalidStateTransition(msg) => {
                ErrorResponse::new("INVALID_STATE_TRANSITION", msg.clone())
            }
            AppError::NotFound(resource) => {
                ErrorResponse::new("NOT_FOUND", format!("{} not found", resource))
            }
            AppError::DuplicateEntry(key) => ErrorResponse {
                message: format!("A record with this {} already exists", key),
                code: "DUPLICATE_ENTRY".to_string(),
                field: Some(key.clone()),
            },
            AppError::Conflict { resource, message } => ErrorResponse {
                message: message.clone(),
                code: "CONFLICT".to_string(),
                field: Some(resource.clone()),
            },
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                ErrorResponse::new("INTERNAL_ERROR", "An internal server error occurred")
            }
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
