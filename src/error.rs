//! Centralized error types for ezarc.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the ezarc library.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The list has no archive directory at all.
    #[error("Archive directory not found: {0}")]
    ArchiveNotFound(PathBuf),

    /// No message file exists for the given id.
    #[error("Message {0} not found in archive")]
    MessageNotFound(u64),

    /// No thread record exists for the given subject hash.
    #[error("Thread '{0}' not found in archive")]
    ThreadNotFound(String),

    /// No author chain file exists for the given author hash.
    #[error("Author '{0}' not found in archive")]
    AuthorNotFound(String),

    /// A message id was zero or not numeric.
    #[error("Invalid message id: {0}")]
    InvalidId(String),

    /// A search or filter pattern was empty or failed to compile.
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// A month argument did not have the YYYYMM shape.
    #[error("Invalid date fragment: {0}")]
    InvalidDateFragment(String),

    /// A full-contents query asked for more messages than the configured cap.
    #[error("Requested {requested} messages with contents, cap is {cap}")]
    ContentsLimitExceeded { requested: usize, cap: usize },

    /// Extraction ran but did not produce the requested attachment.
    #[error("Attachment '{filename}' not found in message {id}")]
    AttachmentNotFound { id: u64, filename: String },

    /// The external text-matching facility failed.
    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    /// A MIME decoding error.
    #[error("MIME decoding error: {0}")]
    Mime(String),
}

/// Convenience alias for `Result<T, ArchiveError>`.
pub type Result<T> = std::result::Result<T, ArchiveError>;

impl ArchiveError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` inside functions returning `ArchiveError`
/// when no path context is available (rare — prefer `ArchiveError::io`).
impl From<std::io::Error> for ArchiveError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<unknown>"),
            source,
        }
    }
}
