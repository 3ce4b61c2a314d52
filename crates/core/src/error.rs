//! Core error types for regsync snapshot handling.
//!
//! All errors are explicit, typed, and recoverable - no panics allowed.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for snapshot loading and decoding.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read snapshot file '{path}': {reason}")]
    FileReadFailed { path: PathBuf, reason: String },

    #[error("snapshot decode error: {reason}")]
    SnapshotDecodeFailed { reason: String },
}

impl Error {
    /// Create a file read error.
    pub fn file_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::FileReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a snapshot decode error.
    pub fn snapshot_decode_failed(reason: impl Into<String>) -> Self {
        Self::SnapshotDecodeFailed {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::snapshot_decode_failed(err.to_string())
    }
}
