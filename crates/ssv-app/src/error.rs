//! Error types for the ssv-app service layer.

use std::path::PathBuf;

use ssv_client::ClientError;
use ssv_core::CoreError;

/// Application error type that wraps errors from the data source and the
/// spreadsheet model and provides one error surface to every front end.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Data source error: {0}")]
    Client(#[from] ClientError),

    #[error("Spreadsheet model error: {0}")]
    Model(#[from] CoreError),

    #[error("Failed to read config file: {path}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write config file: {path}")]
    ConfigWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Session has ended; initialize a new one first")]
    SessionEnded,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// True when the server rejected our credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, AppError::Client(e) if e.is_unauthorized())
    }
}

/// Result type for ssv-app operations.
pub type AppResult<T> = Result<T, AppError>;
