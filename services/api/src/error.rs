//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and how core errors
//! map onto HTTP status codes.

use axum::http::StatusCode;
use backoffice_core::{ExportError, FilterError, LoginFailure, PortError};
use tracing::{error, warn};

use crate::config::ConfigError;

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

    /// Represents a failed schema migration at startup.
    #[error("Migration Error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

//=========================================================================================
// HTTP Status Mapping
//=========================================================================================

/// The error half of every handler result.
pub type HttpError = (StatusCode, String);

pub fn port_status(e: &PortError) -> StatusCode {
    match e {
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Rejected(_) => StatusCode::BAD_REQUEST,
        PortError::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Converts a port error into a response, hiding unexpected failures behind `context`.
pub fn port_error(e: PortError, context: &str) -> HttpError {
    let status = port_status(&e);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("{}: {:?}", context, e);
        return (status, context.to_string());
    }
    warn!("{}: {}", context, e);
    (status, e.to_string())
}

pub fn export_error(e: ExportError) -> HttpError {
    warn!("Export refused: {}", e);
    let status = match e {
        ExportError::NothingInRange(_) | ExportError::NoAttachments(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ExportError::AttachmentMissing(_) => StatusCode::NOT_FOUND,
        ExportError::Archive(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

pub fn filter_error(e: FilterError) -> HttpError {
    (StatusCode::BAD_REQUEST, e.to_string())
}

/// Credential and code rejections are 401; steps refused in the current state are 409;
/// a session store failure after a good code is 503.
pub fn login_status(e: LoginFailure) -> StatusCode {
    match e {
        LoginFailure::InvalidCredentials | LoginFailure::InvalidCode | LoginFailure::CodeExpired => {
            StatusCode::UNAUTHORIZED
        }
        LoginFailure::SessionUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        LoginFailure::ResendUnavailable | LoginFailure::Busy | LoginFailure::WrongStage => {
            StatusCode::CONFLICT
        }
    }
}
