//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Where booking, invoice and tax-filing metadata lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordBackend {
    Memory,
    Postgres { database_url: String },
}

/// Where uploaded PDFs live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachmentBackend {
    Memory,
    Filesystem { root: PathBuf },
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub records: RecordBackend,
    pub attachments: AttachmentBackend,
    /// File holding the persisted session marker; in memory when unset.
    pub session_file: Option<PathBuf>,
    /// JSON list of users allowed to log in, with their hashed secrets.
    pub allow_list_path: PathBuf,
    pub seed_demo_data: bool,
    pub cors_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server Settings ---
        let bind_address = parse_var::<SocketAddr>("BIND_ADDRESS", "0.0.0.0:3000")?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            std::env::var("CORS_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());

        // --- Storage Backends ---
        let records = match var_or("RECORD_STORE", "memory").to_lowercase().as_str() {
            "memory" => RecordBackend::Memory,
            "postgres" => RecordBackend::Postgres {
                database_url: std::env::var("DATABASE_URL")
                    .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "RECORD_STORE".to_string(),
                    format!("'{}' is not one of memory, postgres", other),
                ))
            }
        };

        let attachments = match var_or("ATTACHMENT_STORE", "memory").to_lowercase().as_str() {
            "memory" => AttachmentBackend::Memory,
            "filesystem" => AttachmentBackend::Filesystem {
                root: PathBuf::from(var_or("ATTACHMENTS_PATH", "./attachments")),
            },
            other => {
                return Err(ConfigError::InvalidValue(
                    "ATTACHMENT_STORE".to_string(),
                    format!("'{}' is not one of memory, filesystem", other),
                ))
            }
        };

        let session_file = std::env::var("SESSION_FILE").ok().map(PathBuf::from);

        // --- Login ---
        let allow_list_path = std::env::var("ALLOW_LIST_PATH")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::MissingVar("ALLOW_LIST_PATH".to_string()))?;

        let seed_demo_data = parse_var::<bool>("SEED_DEMO_DATA", "false")?;

        Ok(Self {
            bind_address,
            log_level,
            records,
            attachments,
            session_file,
            allow_list_path,
            seed_demo_data,
            cors_origin,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var_or(name, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string()))
}
