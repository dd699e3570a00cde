//! Recursive pipeline tree builder.
//!
//! `parallel` specs become `ParallelNode`s wrapping their built children;
//! everything else goes through the `Registry`.

use std::sync::Arc;

use crate::config::{NodeSpec, PARALLEL_NODE_TYPE};
use crate::error::BuildResult;
use crate::node::Node;
use crate::parallel::ParallelNode;
use crate::registry::Registry;

/// Build a node tree from `spec`.
///
/// Children are built in declared order and the first failure aborts the
/// whole build. Nesting depth is unbounded.
pub fn build_node(registry: &Registry, spec: &NodeSpec) -> BuildResult<Arc<dyn Node>> {
    if spec.node_type == PARALLEL_NODE_TYPE {
        let children = spec
            .children
            .iter()
            .map(|child| build_node(registry, child))
            .collect::<BuildResult<Vec<_>>>()?;
        return Ok(Arc::new(ParallelNode::new(spec.name.clone(), children)));
    }
    registry.build(spec)
}
