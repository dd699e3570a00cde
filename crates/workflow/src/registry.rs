//! Node registry: type name → constructor.
//!
//! The host registers a constructor for every leaf node type before the
//! engine is built. Constructors receive the full `NodeSpec` and validate
//! their own config keys.
//!
//! ## Usage
//! ```ignore
//! let mut registry = Registry::new();
//! registry.register("rank_simple", |spec| Ok(Arc::new(SimpleRankNode::from_spec(spec)?) as _));
//! let node = registry.build(&NodeSpec::new("rank", "rank_simple"))?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{NodeSpec, PARALLEL_NODE_TYPE};
use crate::error::{BuildError, BuildResult};
use crate::node::Node;

/// Builds a node from its specification.
pub type NodeConstructor = Arc<dyn Fn(&NodeSpec) -> BuildResult<Arc<dyn Node>> + Send + Sync>;

/// Maps config-declared type names to node constructors.
#[derive(Clone, Default)]
pub struct Registry {
    constructors: HashMap<String, NodeConstructor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor. A second registration under the same name
    /// replaces the first.
    ///
    /// `parallel` is handled by the tree builder and cannot be registered.
    pub fn register<F>(&mut self, node_type: impl Into<String>, constructor: F)
    where
        F: Fn(&NodeSpec) -> BuildResult<Arc<dyn Node>> + Send + Sync + 'static,
    {
        let node_type = node_type.into();
        if node_type == PARALLEL_NODE_TYPE {
            warn!("Ignoring registration for reserved node type '{}'", node_type);
            return;
        }
        debug!("Registering node type: {}", node_type);
        self.constructors.insert(node_type, Arc::new(constructor));
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.constructors.contains_key(node_type)
    }

    /// Registered type names, sorted.
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.constructors.keys().cloned().collect();
        types.sort();
        types
    }

    /// Build a leaf node by looking up `spec.node_type`.
    pub fn build(&self, spec: &NodeSpec) -> BuildResult<Arc<dyn Node>> {
        let constructor = self
            .constructors
            .get(&spec.node_type)
            .ok_or_else(|| BuildError::UnknownNodeType(spec.node_type.clone()))?;
        constructor(spec)
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.types())
            .finish()
    }
}
