//! # Error Handling
//!
//! Three layers of errors:
//!
//! - [`ConfigurationError`]: a caller asked for something the query layer cannot express
//!   (unknown field, unknown operator, wrong operand shape or type). Raised before any
//!   query is sent to the database.
//! - [`CrudError`]: what the [`CRUDResource`](crate::CRUDResource) operations return.
//!   Database errors are carried through unchanged.
//! - [`ApiError`]: the HTTP edge. Maps every error onto a status code and a sanitized
//!   body, logging internal details through `tracing` instead of sending them to clients.
//!
//! ## Logging
//!
//! Internal errors are logged using the `tracing` crate. To see them, install a
//! subscriber in your application:
//!
//! ```rust,ignore
//! tracing_subscriber::fmt()
//!     .with_target(false)
//!     .compact()
//!     .init();
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{DbErr, SqlErr};
use serde::Serialize;
use std::fmt;

use crate::validation::{ValidationError, ValidationErrors};

/// Raised while turning caller input into a query. Never raised by the database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("unknown field `{field}` for {resource}")]
    UnknownField { resource: String, field: String },

    #[error("unknown operator `{operator}` on field `{field}`")]
    UnknownOperator { field: String, operator: String },

    #[error("operator object for `{field}` must have exactly one key, found {found}")]
    OperatorCount { field: String, found: usize },

    #[error("malformed operand for `{operator}` on `{field}`: {reason}")]
    MalformedOperand {
        field: String,
        operator: &'static str,
        reason: String,
    },

    #[error("field `{field}` expects {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        got: String,
    },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("{0} has no soft-delete column")]
    SoftDeleteUnsupported(&'static str),
}

/// Error returned by the CRUD operations.
#[derive(Debug, thiserror::Error)]
pub enum CrudError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Database(#[from] DbErr),
}

impl From<ValidationError> for CrudError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(ValidationErrors::from(err))
    }
}

/// API error type with automatic logging and sanitized responses
#[derive(Debug)]
pub enum ApiError {
    /// 404 Not Found
    NotFound {
        resource: String,
        id: Option<String>,
    },

    /// 400 Bad Request
    BadRequest { message: String },

    /// 409 Conflict, e.g. a unique constraint violation
    Conflict { message: String },

    /// 422 Unprocessable Entity
    ValidationFailed { errors: Vec<String> },

    /// 500 Internal Server Error. The `DbErr` is logged, not sent.
    Database { message: String, internal: DbErr },

    /// 500 Internal Server Error with optional logged details
    Internal {
        message: String,
        internal: Option<String>,
    },
}

impl ApiError {
    // ============================================================================
    // Constructors
    // ============================================================================

    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation_failed(errors: Vec<String>) -> Self {
        Self::ValidationFailed { errors }
    }

    /// Wrap a database error. Details are logged, the client gets a generic message.
    #[must_use]
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    // ============================================================================
    // Internal methods
    // ============================================================================

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The sanitized message sent to clients
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { resource, id } => match id {
                Some(id) => format!("{resource} with ID '{id}' not found"),
                None => format!("{resource} not found"),
            },
            Self::ValidationFailed { errors } => match errors.as_slice() {
                [single] => single.clone(),
                _ => format!("Validation failed: {}", errors.join(", ")),
            },
            Self::BadRequest { message }
            | Self::Conflict { message }
            | Self::Database { message, .. }
            | Self::Internal { message, .. } => message.clone(),
        }
    }

    fn log_internal(&self) {
        match self {
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::Internal {
                internal: Some(details),
                ..
            } => {
                tracing::error!(details = %details, "Internal error occurred");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

/// Error body sent to clients
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let response = match &self {
            Self::ValidationFailed { errors } => ErrorResponse {
                error: "Validation failed".to_string(),
                details: Some(errors.clone()),
            },
            _ => ErrorResponse {
                error: self.user_message(),
                details: None,
            },
        };

        (status, Json(response)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// Conversions
// ============================================================================

/// - `DbErr::RecordNotFound` → 404
/// - unique constraint violations → 409
/// - everything else → 500, logged and sanitized
impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        if let DbErr::RecordNotFound(msg) = &err {
            let resource = msg.split_whitespace().next().unwrap_or("Resource");
            return Self::not_found(resource, None);
        }
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            tracing::debug!(detail = %detail, "Unique constraint violation");
            return Self::conflict("Duplicate entry");
        }
        Self::database(err)
    }
}

/// Filter problems are the caller's (400). A resource without soft delete is a server
/// misconfiguration (500, details logged).
impl From<ConfigurationError> for ApiError {
    fn from(err: ConfigurationError) -> Self {
        match err {
            ConfigurationError::SoftDeleteUnsupported(_) => {
                Self::internal("Operation not supported", Some(err.to_string()))
            }
            _ => Self::bad_request(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::validation_failed(errors.errors().iter().map(ToString::to_string).collect())
    }
}

impl From<CrudError> for ApiError {
    fn from(err: CrudError) -> Self {
        match err {
            CrudError::Configuration(e) => e.into(),
            CrudError::Validation(e) => e.into(),
            CrudError::Database(e) => e.into(),
        }
    }
}
