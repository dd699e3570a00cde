//! Core trait for pipeline nodes.
//!
//! Every step of a pipeline (recall, filter, rank, parallel) implements
//! `Node`. Nodes are built once when the engine loads and then shared by
//! all concurrent requests, so `execute` must keep per-request state in
//! the `RunContext`, never in `self`.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::context::RunContext;

/// The unit of work in a pipeline.
///
/// `Send + Sync` lets the same node run for many requests at once and be
/// moved into spawned parallel branches.
#[async_trait]
pub trait Node: Send + Sync {
    /// Name from the pipeline document, used for logging and as a recall source tag
    fn name(&self) -> &str;

    /// Variant tag, e.g. "recall", "filter", "rank", "parallel"
    fn node_type(&self) -> &str;

    /// Transform the shared run state.
    async fn execute(&self, ctx: Arc<RunContext>) -> Result<()>;
}
