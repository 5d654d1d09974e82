//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and the mapping of
//! conversation-turn failures onto HTTP responses.

use crate::config::ConfigError;
use axum::http::StatusCode;
use medassist_core::orchestrator::TurnError;
use medassist_core::ports::PortError;
use medassist_core::quota::QuotaError;

/// The primary error type for the `api` service.
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

    /// Represents a failure to apply the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Maps a failed turn to the status code and user-facing message a handler returns.
pub fn turn_error_response(err: &TurnError) -> (StatusCode, String) {
    let status = match err {
        TurnError::Validation(_) => StatusCode::BAD_REQUEST,
        TurnError::AccountDisabled => StatusCode::FORBIDDEN,
        TurnError::Quota(QuotaError::Exceeded { .. }) | TurnError::GuestLimit(_) => {
            StatusCode::TOO_MANY_REQUESTS
        }
        TurnError::Quota(QuotaError::Backend(_)) => StatusCode::SERVICE_UNAVAILABLE,
        TurnError::Generation(_) => StatusCode::BAD_GATEWAY,
    };
    (status, err.to_string())
}

/// Maps a port failure from a CRUD-style handler.
pub fn port_error_response(err: &PortError, context: &str) -> (StatusCode, String) {
    match err {
        PortError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
        PortError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
        PortError::Unexpected(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to {}", context),
        ),
    }
}
