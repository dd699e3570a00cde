//! Error types for the recommendation service.

use std::path::PathBuf;

use history::HistoryError;
use llm_client::LlmClientError;
use thiserror::Error;
use workflow::BuildError;

/// Errors surfaced to callers of the service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid token")]
    Unauthorized,

    #[error("scene '{0}' not supported")]
    SceneNotSupported(String),

    /// The pipeline ran and failed; `trace` holds the run's log for diagnosis
    #[error("recommendation failed: {message}")]
    RecommendationFailed { message: String, trace: Vec<String> },

    #[error("task with ID '{0}' not found")]
    TaskNotFound(String),

    #[error("invalid config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error(transparent)]
    Engine(#[from] BuildError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    LlmClient(#[from] LlmClientError),
}

impl ServiceError {
    pub(crate) fn config(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ServiceError::Config {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
