//! Box Office — API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use boxoffice_core::error::DomainError;
use serde::Serialize;
use thiserror::Error;

/// Startup errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),

    /// Tracing or OpenTelemetry setup failed.
    #[error("telemetry error: {0}")]
    Telemetry(String),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
}

/// HTTP-layer error. Absent reads become `NotFound`; everything else wraps
/// the `DomainError` the repository returned.
#[derive(Debug)]
pub enum ApiError {
    /// The requested record does not exist.
    NotFound(String),
    /// A domain or infrastructure failure.
    Domain(DomainError),
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self::Domain(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            Self::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
            Self::Domain(err) => {
                let (status, code) = match &err {
                    DomainError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
                    DomainError::PreconditionFailed(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "precondition_failed")
                    }
                    DomainError::Infrastructure(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
                    }
                };
                (status, code, err.to_string())
            }
        };

        let body = ErrorBody {
            error: error_code,
            message,
        };

        (status, Json(body)).into_response()
    }
}
