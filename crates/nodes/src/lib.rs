//! # Nodes Crate
//!
//! The leaf steps a pipeline document can name, and the wiring that puts
//! them into a `workflow::Registry`.
//!
//! ## Node Types
//!
//! | type                 | stage  | node                    |
//! |----------------------|--------|-------------------------|
//! | `recall_llm`         | recall | `LlmRecallNode`         |
//! | `filter_history`     | filter | `HistoryFilterNode`     |
//! | `filter_favorites`   | filter | `FavoritesFilterNode`   |
//! | `rank_simple`        | rank   | `SimpleRankNode`        |
//! | `rank_mix_favorites` | rank   | `MixFavoritesRankNode`  |
//!
//! ## Example Usage
//!
//! ```ignore
//! let deps = NodeDeps::new(history_store).with_llm_client("gpt", client);
//! let mut registry = Registry::new();
//! register_default_nodes(&mut registry, deps);
//! ```

pub mod filters;
pub mod rank;
pub mod recall_llm;

use std::collections::HashMap;
use std::sync::Arc;

use history::HistoryStore;
use llm_client::ChatClient;
use tracing::debug;
use workflow::{Node, NodeSpec, Registry};

// Re-export node types
pub use filters::{FavoritesFilterNode, HistoryFilterNode};
pub use rank::{MixFavoritesRankNode, RankOrder, SimpleRankNode};
pub use recall_llm::LlmRecallNode;

pub const RECALL_LLM: &str = "recall_llm";
pub const FILTER_HISTORY: &str = "filter_history";
pub const FILTER_FAVORITES: &str = "filter_favorites";
pub const RANK_SIMPLE: &str = "rank_simple";
pub const RANK_MIX_FAVORITES: &str = "rank_mix_favorites";

/// Shared services the default nodes are built with.
#[derive(Clone)]
pub struct NodeDeps {
    pub history: Arc<dyn HistoryStore>,

    /// LLM config key → client, referenced by `llm_config_key`
    pub llm_clients: HashMap<String, Arc<dyn ChatClient>>,
}

impl NodeDeps {
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self {
            history,
            llm_clients: HashMap::new(),
        }
    }

    pub fn with_llm_client(mut self, key: impl Into<String>, client: Arc<dyn ChatClient>) -> Self {
        self.llm_clients.insert(key.into(), client);
        self
    }
}

/// Register every built-in node type into `registry`.
pub fn register_default_nodes(registry: &mut Registry, deps: NodeDeps) {
    let NodeDeps { history, llm_clients } = deps;
    let llm_clients = Arc::new(llm_clients);

    registry.register(RECALL_LLM, move |spec: &NodeSpec| {
        Ok(Arc::new(LlmRecallNode::from_spec(spec, &llm_clients)?) as Arc<dyn Node>)
    });

    registry.register(FILTER_HISTORY, move |spec: &NodeSpec| {
        Ok(Arc::new(HistoryFilterNode::from_spec(spec, history.clone())?) as Arc<dyn Node>)
    });

    registry.register(FILTER_FAVORITES, |spec: &NodeSpec| {
        Ok(Arc::new(FavoritesFilterNode::from_spec(spec)?) as Arc<dyn Node>)
    });

    registry.register(RANK_SIMPLE, |spec: &NodeSpec| {
        Ok(Arc::new(SimpleRankNode::from_spec(spec)?) as Arc<dyn Node>)
    });

    registry.register(RANK_MIX_FAVORITES, |spec: &NodeSpec| {
        Ok(Arc::new(MixFavoritesRankNode::from_spec(spec)?) as Arc<dyn Node>)
    });

    debug!("Registered default nodes: {:?}", registry.types());
}
