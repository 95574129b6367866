// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the Geo PWA worker

use thiserror::Error;

/// Result type alias
pub type GpwResult<T> = Result<T, GpwError>;

/// Main error type
#[derive(Error, Debug)]
pub enum GpwError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout")]
    Timeout,

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// Neither the cache nor the network could produce content.
    #[error("No content available for {0}")]
    Unavailable(String),

    #[error("Install failed on {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Corrupt cache entry: {0}")]
    CorruptEntry(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl GpwError {
    /// Whether the error means the network could not be reached.
    pub fn is_offline(&self) -> bool {
        matches!(self, GpwError::Network(_) | GpwError::Timeout)
    }

    /// Errors that must keep a worker from reaching the installed state.
    pub fn is_fatal_to_install(&self) -> bool {
        matches!(
            self,
            GpwError::InstallFailed { .. }
                | GpwError::Storage(_)
                | GpwError::QuotaExceeded(_)
                | GpwError::Io(_)
        )
    }
}

impl From<serde_json::Error> for GpwError {
    fn from(e: serde_json::Error) -> Self {
        GpwError::Serialization(e.to_string())
    }
}
