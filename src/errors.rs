//! Structured error types for the memory store API
//!
//! One error kind per failure class from the service contract; machine
//! readable codes for clients, HTTP status mapping for the axum surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured error response for API clients
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Additional error context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Application error kinds.
///
/// The scoring engine never raises; every surface here is a store, embedding,
/// or input boundary.
#[derive(Debug)]
pub enum AppError {
    /// Caller supplied malformed input; rejected before any side effect.
    InvalidQuery { field: String, reason: String },

    /// A write would break a store invariant; the transaction is rolled back.
    InvariantViolation(String),

    /// Id does not exist in the tenant scope.
    NotFound(String),

    /// Optimistic counter update lost its retry budget.
    Conflict(String),

    /// Store or embedding provider unreachable; no partial commits.
    BackendUnavailable(String),

    /// Cooperative cancellation; transaction rolled back, no state change.
    Cancelled,

    /// Generic wrapper for external errors
    Internal(anyhow::Error),
}

impl AppError {
    pub fn invalid_query(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Get error code for client identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuery { .. } => "INVALID_QUERY",
            Self::InvariantViolation(_) => "INVARIANT_VIOLATION",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            Self::Cancelled => "CANCELLED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidQuery { .. } | Self::InvariantViolation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Cancelled => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get detailed error message
    pub fn message(&self) -> String {
        match self {
            Self::InvalidQuery { field, reason } => {
                format!("Invalid query field '{field}': {reason}")
            }
            Self::InvariantViolation(msg) => format!("Invariant violation: {msg}"),
            Self::NotFound(id) => format!("Memory item not found: {id}"),
            Self::Conflict(msg) => format!("Conflicting concurrent update: {msg}"),
            Self::BackendUnavailable(msg) => format!("Backend unavailable: {msg}"),
            Self::Cancelled => "Operation cancelled".to_string(),
            Self::Internal(err) => format!("Internal error: {err}"),
        }
    }

    /// Convert to structured error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.message(),
            details: None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

/// Map store-layer errors onto the service error kinds.
///
/// Row-level lock contention (`SQLITE_BUSY`/`SQLITE_LOCKED`) surfaces as
/// `Conflict` so the retrieval pipeline can apply its retry policy; anything
/// else from the backend is `BackendUnavailable`.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) => {
                let msg = db.message().to_lowercase();
                if msg.contains("locked") || msg.contains("busy") {
                    Self::Conflict(db.message().to_string())
                } else if msg.contains("check constraint") || msg.contains("not null") {
                    Self::InvariantViolation(db.message().to_string())
                } else {
                    Self::BackendUnavailable(db.message().to_string())
                }
            }
            _ => Self::BackendUnavailable(err.to_string()),
        }
    }
}

/// Axum IntoResponse implementation for proper HTTP responses
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[self.code()])
            .inc();

        let status = self.status_code();
        let body = self.to_response();

        (status, Json(body)).into_response()
    }
}

/// Helper trait to convert validation errors
pub trait ValidationErrorExt<T> {
    fn map_validation_err(self, field: &str) -> Result<T>;
}

impl<T> ValidationErrorExt<T> for anyhow::Result<T> {
    fn map_validation_err(self, field: &str) -> Result<T> {
        self.map_err(|e| AppError::InvalidQuery {
            field: field.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Type alias for Results using AppError
pub type Result<T> = std::result::Result<T, AppError>;
