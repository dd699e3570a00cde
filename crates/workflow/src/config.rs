//! Pipeline document schema.
//!
//! ```json
//! {
//!   "pipelines": {
//!     "music": {
//!       "description": "LLM recall with history filtering",
//!       "timeout_ms": 60000,
//!       "nodes": [
//!         { "name": "recall", "type": "parallel", "children": [ ... ] },
//!         { "name": "rank", "type": "rank_simple", "config": { "order": "desc", "limit": 10 } }
//!       ]
//!     }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BuildError, BuildResult};

/// Node type handled by the framework itself instead of the registry.
pub const PARALLEL_NODE_TYPE: &str = "parallel";

/// Specification of one node in a pipeline tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub node_type: String,

    #[serde(default)]
    pub config: Map<String, Value>,

    /// Only meaningful for `parallel` nodes
    #[serde(default, alias = "nodes", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: node_type.into(),
            ..Default::default()
        }
    }

    /// Add a config entry (builder pattern).
    pub fn with_config(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Add a child spec (builder pattern).
    pub fn with_child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    /// Numeric config value. JSON integers and floats are both accepted.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.config.get(key).and_then(Value::as_f64)
    }

    /// Non-negative integer config value; fractional parts are dropped.
    pub fn get_usize(&self, key: &str) -> Option<usize> {
        self.get_f64(key)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v as usize)
    }

    /// String config value that must be present.
    pub fn require_str(&self, key: &str) -> BuildResult<&str> {
        match self.config.get(key) {
            None => Err(BuildError::MissingConfig {
                node: self.name.clone(),
                key: key.to_string(),
            }),
            Some(value) => value.as_str().ok_or_else(|| BuildError::InvalidConfig {
                node: self.name.clone(),
                reason: format!("'{}' must be a string, got {}", key, value),
            }),
        }
    }
}

/// One scene's pipeline definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub description: String,

    /// Advisory only; the engine does not enforce it
    #[serde(default)]
    pub timeout_ms: u64,

    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

/// The whole pipeline document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub pipelines: HashMap<String, PipelineConfig>,
}

impl GlobalConfig {
    pub fn from_json(json: &str) -> BuildResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> BuildResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|source| BuildError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&data)
    }
}
