//! Error types for the history crate.

use thiserror::Error;

/// Errors that can occur while reading or writing exposure history
#[derive(Error, Debug)]
pub enum HistoryError {
    /// History file could not be opened, read or written
    #[error("I/O error on history file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be encoded
    #[error("failed to encode history record: {0}")]
    Encode(#[from] serde_json::Error),

    /// A writer panicked while holding the record lock
    #[error("history store lock poisoned")]
    LockPoisoned,
}

impl HistoryError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        HistoryError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, HistoryError>;
