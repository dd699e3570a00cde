//! Error types for the workflow crate.
//!
//! Errors fall into two families:
//! - `BuildError`: anything that goes wrong while turning the pipeline
//!   document into nodes. These are fatal at startup.
//! - `RunError`: what `Engine::run` hands back per request. The
//!   `PipelineNotFound` variant is matched by kind, never by message.
//!
//! `FanOutError` is produced by the parallel node when every child failed
//! and travels through `RunError::Node` like any other node error.

use thiserror::Error;

/// Errors raised while loading the pipeline document or constructing nodes.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The pipeline document could not be read
    #[error("failed to read pipeline config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The pipeline document is not valid JSON for our schema
    #[error("failed to parse pipeline config: {0}")]
    Parse(#[from] serde_json::Error),

    /// No constructor registered under this type name
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    /// A constructor needed a config key that isn't there
    #[error("node '{node}' missing required config key '{key}'")]
    MissingConfig { node: String, key: String },

    /// A config value exists but is unusable
    #[error("node '{node}' has invalid config: {reason}")]
    InvalidConfig { node: String, reason: String },

    /// Wraps a node failure with the scene it was declared in
    #[error("failed to create node '{node}' in pipeline '{scene}': {source}")]
    Node {
        scene: String,
        node: String,
        #[source]
        source: Box<BuildError>,
    },
}

/// Errors returned by `Engine::run`.
#[derive(Error, Debug)]
pub enum RunError {
    /// No pipeline is registered for the requested scene
    #[error("pipeline not found for scene: {0}")]
    PipelineNotFound(String),

    /// A node failed; displays exactly as the node's own error
    #[error(transparent)]
    Node(anyhow::Error),
}

impl RunError {
    /// True for the not-found kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RunError::PipelineNotFound(_))
    }
}

/// Aggregated failure of a parallel node whose children all failed.
#[derive(Error, Debug)]
pub enum FanOutError {
    #[error("all parallel nodes failed: {}", failures.join("; "))]
    AllFailed { node: String, failures: Vec<String> },
}

/// Convenience alias for construction results
pub type BuildResult<T> = std::result::Result<T, BuildError>;
