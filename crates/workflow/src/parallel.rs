//! Fan-out node: runs its children concurrently over one `RunContext`.
//!
//! ## Algorithm
//! 1. Spawn every child as its own tokio task, all at once
//! 2. Each branch traces its start, runs the child, traces the outcome
//! 3. Wait for every branch; a failing sibling never cancels the others
//! 4. Panics are caught at the task boundary and become per-child errors
//! 5. Once every branch has been polled at least once, a cancelled context
//!    (explicit or by deadline) aborts the branches still pending; they are
//!    counted as failed. A branch is never aborted before it got to run, so
//!    in-memory children complete even under an expired deadline
//! 6. Zero successes with at least one failure fails the node with every
//!    child's error; otherwise failures are only traced
//!
//! The node takes no lock of its own. Children synchronize through the
//! `RunContext` accessors.

use std::any::Any;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::oneshot;
use tokio::task::JoinError;
use tracing::{debug, instrument, warn};

use crate::config::PARALLEL_NODE_TYPE;
use crate::context::RunContext;
use crate::error::FanOutError;
use crate::node::Node;

/// Composite node with best-effort join semantics.
pub struct ParallelNode {
    name: String,
    children: Vec<Arc<dyn Node>>,
}

impl ParallelNode {
    pub fn new(name: impl Into<String>, children: Vec<Arc<dyn Node>>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    pub fn children(&self) -> &[Arc<dyn Node>] {
        &self.children
    }
}

#[async_trait]
impl Node for ParallelNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_type(&self) -> &str {
        PARALLEL_NODE_TYPE
    }

    #[instrument(skip_all, fields(node = %self.name, children = self.children.len()))]
    async fn execute(&self, ctx: Arc<RunContext>) -> Result<()> {
        ctx.add_log(format!("Start ParallelNode: {}", self.name));

        let names: Vec<String> = self.children.iter().map(|c| c.name().to_string()).collect();
        let mut started = Vec::with_capacity(self.children.len());
        let handles: Vec<_> = self
            .children
            .iter()
            .map(|child| {
                let (started_tx, started_rx) = oneshot::channel();
                started.push(started_rx);
                tokio::spawn(run_branch(child.clone(), ctx.clone(), started_tx))
            })
            .collect();
        let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let mut pending: FuturesUnordered<_> = handles
            .into_iter()
            .enumerate()
            .map(|(index, handle)| async move { (index, handle.await) })
            .collect();

        let mut outcomes: Vec<Option<std::result::Result<Result<()>, JoinError>>> =
            (0..names.len()).map(|_| None).collect();
        // Branch outputs are buffered in their JoinHandles meanwhile.
        for started_rx in started {
            let _ = started_rx.await;
        }

        let mut abandoned = false;

        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((index, outcome)) => outcomes[index] = Some(outcome),
                    None => break,
                },
                _ = ctx.cancelled(), if !abandoned => {
                    abandoned = true;
                    warn!("Context cancelled, abandoning unfinished branches of {}", self.name);
                    ctx.add_log(format!(
                        "ParallelNode {} cancelled, abandoning unfinished branches",
                        self.name
                    ));
                    for handle in &abort_handles {
                        handle.abort();
                    }
                }
            }
        }

        let mut success_count = 0usize;
        let mut failures = Vec::new();
        for (name, outcome) in names.iter().zip(outcomes) {
            match outcome {
                Some(Ok(Ok(()))) => success_count += 1,
                Some(Ok(Err(err))) => failures.push(format!("node {}: {:#}", name, err)),
                Some(Err(join_err)) if join_err.is_panic() => {
                    let message = panic_message(join_err.into_panic());
                    ctx.add_log(format!("  -> Node {} panicked: {}", name, message));
                    failures.push(format!("node {} panic: {}", name, message));
                }
                Some(Err(_)) | None => {
                    ctx.add_log(format!("  -> Node {} cancelled", name));
                    failures.push(format!("node {} cancelled", name));
                }
            }
        }

        if success_count == 0 && !failures.is_empty() {
            warn!("All {} branches of {} failed", failures.len(), self.name);
            return Err(FanOutError::AllFailed {
                node: self.name.clone(),
                failures,
            }
            .into());
        }

        if failures.is_empty() {
            ctx.add_log(format!("End ParallelNode: {} (All success)", self.name));
        } else {
            debug!(
                "{} finished with {} failed branches out of {}",
                self.name,
                failures.len(),
                names.len()
            );
            ctx.add_log(format!(
                "ParallelNode completed with {} errors (ignored due to partial success): {}",
                failures.len(),
                failures.join("; ")
            ));
        }
        Ok(())
    }
}

/// One branch: trace, run the child, trace the outcome.
async fn run_branch(
    child: Arc<dyn Node>,
    ctx: Arc<RunContext>,
    started: oneshot::Sender<()>,
) -> Result<()> {
    let _ = started.send(());
    ctx.add_log(format!("  -> Start child node: {}", child.name()));
    let result = child.execute(ctx.clone()).await;
    match &result {
        Ok(()) => ctx.add_log(format!("  -> Node {} completed", child.name())),
        Err(err) => ctx.add_log(format!("  -> Node {} failed: {:#}", child.name(), err)),
    }
    result
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
