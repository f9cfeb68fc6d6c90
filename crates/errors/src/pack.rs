//! Pack fetch, extraction, and patch-application error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PackError {
    #[error("failed to fetch pack {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("failed to extract archive {path}: {message}")]
    ExtractFailed { path: String, message: String },

    #[error("archive contains path traversal: {path}")]
    PathTraversal { path: String },

    #[error("delta pack at {dir} has no delta directory")]
    MissingDeltaDir { dir: String },

    #[error("malformed delta file name: {name}")]
    MalformedDeltaName { name: String },

    #[error("patch apply failed for {delta}: {message}")]
    PatchFailed { delta: String, message: String },

    #[error("scratch directory error: {message}")]
    Scratch { message: String },
}
