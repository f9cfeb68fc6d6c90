#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for relcheck
//!
//! This crate provides fine-grained error types organized by domain,
//! unified under a single [`Error`] for cross-crate boundaries.

use thiserror::Error;

pub mod config;
pub mod manifest;
pub mod network;
pub mod pack;

// Re-export all error types at the root
pub use config::ConfigError;
pub use manifest::ManifestError;
pub use network::NetworkError;
pub use pack::PackError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("pack error: {0}")]
    Pack(#[from] PackError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
        path: Option<std::path::PathBuf>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

/// Result type alias for relcheck operations
pub type Result<T> = std::result::Result<T, Error>;
