use std::time::Duration;

use thiserror::Error;

/// Core error type for Vigil operations.
#[derive(Error, Debug)]
pub enum VigilError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Peer error: {0}")]
    Peer(#[from] PeerError),

    #[error("Fleet directory error: {0}")]
    Directory(String),

    #[error("Simulator error: {0}")]
    Simulator(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for VigilError {
    fn from(e: serde_json::Error) -> Self {
        VigilError::Serialization(e.to_string())
    }
}

/// Normalized failure of a single peer wake request.
///
/// Transport errors are collapsed into a handful of kinds so that warn logs
/// read the same regardless of which HTTP stack produced them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("invalid peer URI [{0}]")]
    InvalidUri(String),

    #[error("{0}")]
    Transport(String),
}

impl PeerError {
    /// Map a reqwest error to its normalized kind.
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            return PeerError::Timeout(timeout);
        }
        if let Some(status) = err.status() {
            return PeerError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            };
        }
        if err.is_connect() {
            return PeerError::Connect(root_cause(err));
        }
        PeerError::Transport(root_cause(err))
    }
}

/// Innermost error message, which is usually the only informative one.
fn root_cause(err: &(dyn std::error::Error + 'static)) -> String {
    let mut current = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

/// Result type alias using VigilError.
pub type Result<T> = std::result::Result<T, VigilError>;
