//! Filter to remove items the user already lists as favorites.
//!
//! There's no point recommending something the user told us they love.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;
use workflow::{BuildResult, Node, NodeSpec, RunContext};

use super::remove_by_name;

/// Removes candidates whose name matches one of the user's favorites.
///
/// ## Algorithm
/// Builds a HashSet of favorite names for O(1) lookups.
pub struct FavoritesFilterNode {
    name: String,
}

impl FavoritesFilterNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn from_spec(spec: &NodeSpec) -> BuildResult<Self> {
        Ok(Self::new(spec.name.clone()))
    }
}

#[async_trait]
impl Node for FavoritesFilterNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_type(&self) -> &str {
        "filter"
    }

    async fn execute(&self, ctx: Arc<RunContext>) -> Result<()> {
        let candidates = ctx.candidates();
        if candidates.is_empty() {
            return Ok(());
        }

        let favorites = ctx.favorites();
        let favorite_set: HashSet<&str> = favorites.iter().map(String::as_str).collect();
        let (kept, removed) = remove_by_name(candidates, &favorite_set);

        debug!("{} removed {} favorites from candidates", self.name, removed);
        ctx.add_log(format!(
            "Favorites filter ({}) removed {} items, kept {}",
            self.name,
            removed,
            kept.len()
        ));
        ctx.update_candidates(kept);
        Ok(())
    }
}
