//! Manifest parsing and lookup error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ManifestError {
    #[error("manifest {path} not found in local cache")]
    NotFound { path: String },

    #[error("failed to parse manifest {path}: {message}")]
    ParseFailed { path: String, message: String },

    #[error("invalid manifest header line: {line}")]
    InvalidHeader { line: String },

    #[error("invalid file entry at {path}:{line_no}: {message}")]
    InvalidEntry {
        path: String,
        line_no: usize,
        message: String,
    },

    #[error("invalid content hash: {message}")]
    InvalidHash { message: String },
}
