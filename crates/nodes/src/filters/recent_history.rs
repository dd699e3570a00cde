//! Filter to remove items the user was already shown recently.
//!
//! Looks up the user's exposure history for the active domain and drops
//! every candidate seen within the lookback window.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use history::HistoryStore;
use tracing::{debug, warn};
use workflow::{BuildError, BuildResult, Node, NodeSpec, RunContext};

use super::remove_by_name;

/// Default lookback window in days
pub const DEFAULT_LOOKBACK_DAYS: u32 = 7;

/// Removes candidates found in the user's recent history.
///
/// ## Domain resolution
/// 1. The node's own `domain` config key, if set
/// 2. Otherwise the run context's `domain` config entry
/// 3. Otherwise the node fails: a missing domain is a configuration bug
///
/// A failing history store does not fail the node; the filter degrades to
/// a no-op and records the failure in the trace log.
pub struct HistoryFilterNode {
    name: String,
    store: Arc<dyn HistoryStore>,
    lookback_days: u32,
    domain: Option<String>,
}

impl HistoryFilterNode {
    /// Create a new HistoryFilterNode.
    ///
    /// # Arguments
    /// * `name` - Node name from the pipeline document
    /// * `store` - Shared history store
    /// * `lookback_days` - How far back history counts
    pub fn new(name: impl Into<String>, store: Arc<dyn HistoryStore>, lookback_days: u32) -> Self {
        Self {
            name: name.into(),
            store,
            lookback_days,
            domain: None,
        }
    }

    /// Pin the domain instead of reading it from the run context.
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Build from config keys `lookback_days` (default 7) and optional `domain`.
    pub fn from_spec(spec: &NodeSpec, store: Arc<dyn HistoryStore>) -> BuildResult<Self> {
        let lookback_days = match spec.config.get("lookback_days") {
            None => DEFAULT_LOOKBACK_DAYS,
            Some(_) => spec
                .get_usize("lookback_days")
                .and_then(|d| u32::try_from(d).ok())
                .ok_or_else(|| BuildError::InvalidConfig {
                    node: spec.name.clone(),
                    reason: "'lookback_days' must be a non-negative number".to_string(),
                })?,
        };

        let mut node = Self::new(spec.name.clone(), store, lookback_days);
        if spec.config.contains_key("domain") {
            node = node.with_domain(spec.require_str("domain")?);
        }
        Ok(node)
    }

    fn resolve_domain(&self, ctx: &RunContext) -> Result<String> {
        self.domain
            .clone()
            .or_else(|| ctx.config_str("domain").map(str::to_string))
            .ok_or_else(|| anyhow!("history filter '{}': no domain configured for this run", self.name))
    }
}

#[async_trait]
impl Node for HistoryFilterNode {
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

        let domain = self.resolve_domain(&ctx)?;
        let history_items = match self.store.recent(ctx.user_id(), &domain, self.lookback_days) {
            Ok(items) => items,
            Err(err) => {
                warn!("History lookup failed for user {}: {}", ctx.user_id(), err);
                ctx.add_log(format!("Failed to get history: {}", err));
                return Ok(());
            }
        };

        let history_set: HashSet<&str> = history_items.iter().map(String::as_str).collect();
        let (kept, removed) = remove_by_name(candidates, &history_set);

        debug!(
            "{} removed {} items seen in the last {} days ({})",
            self.name, removed, self.lookback_days, domain
        );
        ctx.add_log(format!(
            "History filter ({}) removed {} items, kept {}",
            self.name,
            removed,
            kept.len()
        ));
        ctx.update_candidates(kept);
        Ok(())
    }
}
