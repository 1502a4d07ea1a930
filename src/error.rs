//! Typed errors and HTTP mapping.
//!
//! Three tiers: `ConfigError` for programming and deployment defects (raised
//! immediately), `DbError` for operational failures (also retained on the
//! record as its last failure), and the client-facing variants of `AppError`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unsupported database vendor: {0}")]
    UnsupportedVendor(String),
    #[error("invalid identifier for {kind}: '{value}'")]
    InvalidIdentifier { kind: &'static str, value: String },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Operational failure of a statement or transaction. Cloneable so a record
/// can keep it as its last failure and still hand it to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DbError {
    #[error("query: {0}")]
    Query(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("connection: {0}")]
    Connection(String),
    #[error("batch: {0}")]
    Batch(String),
    #[error("decode: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) => {
                use sqlx::error::ErrorKind;
                match db.kind() {
                    ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation => DbError::Constraint(db.message().to_string()),
                    _ => DbError::Query(db.message().to_string()),
                }
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => DbError::Connection(e.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => DbError::Decode(e.to_string()),
            _ => DbError::Query(e.to_string()),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database: {0}")]
    Db(#[from] DbError),
    #[error("method {verb} not allowed on controller '{controller}'")]
    MethodNotAllowed {
        verb: String,
        controller: String,
        allowed: Vec<String>,
    },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Db(DbError::Constraint(_)) => StatusCode::CONFLICT,
            AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "config_error",
            AppError::Db(DbError::Constraint(_)) => "conflict",
            AppError::Db(_) => "database_error",
            AppError::MethodNotAllowed { .. } => "method_not_allowed",
            AppError::NotFound(_) => "not_found",
            AppError::Validation(_) => "validation_error",
            AppError::BadRequest(_) => "bad_request",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let details = match &self {
            AppError::MethodNotAllowed { verb, controller, .. } => Some(serde_json::json!({
                "verb": verb,
                "controller": controller,
            })),
            _ => None,
        };
        let allow = match &self {
            AppError::MethodNotAllowed { allowed, .. } => HeaderValue::from_str(&allowed.join(", ")).ok(),
            _ => None,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details,
            },
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(allow) = allow {
            response.headers_mut().insert(header::ALLOW, allow);
        }
        response
    }
}
