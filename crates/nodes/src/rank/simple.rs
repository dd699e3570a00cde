//! Reorders and truncates the candidate set.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use workflow::{BuildError, BuildResult, Item, Node, NodeSpec, RunContext};

/// How the candidate set is ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankOrder {
    /// Highest score first
    Desc,
    /// Lowest score first
    Asc,
    /// Random order
    #[default]
    Shuffle,
}

impl FromStr for RankOrder {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "desc" => Ok(RankOrder::Desc),
            "asc" => Ok(RankOrder::Asc),
            "shuffle" => Ok(RankOrder::Shuffle),
            other => Err(format!("unknown rank order '{}', expected desc, asc or shuffle", other)),
        }
    }
}

impl fmt::Display for RankOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RankOrder::Desc => "desc",
            RankOrder::Asc => "asc",
            RankOrder::Shuffle => "shuffle",
        };
        f.write_str(s)
    }
}

/// Sorts candidates by score (or shuffles them) and keeps at most `limit`.
///
/// ## Config
/// - `order`: "desc", "asc" or "shuffle" (default "shuffle")
/// - `limit`: maximum number of items, 0 or absent means no limit
pub struct SimpleRankNode {
    name: String,
    order: RankOrder,
    limit: Option<usize>,
}

impl SimpleRankNode {
    pub fn new(name: impl Into<String>, order: RankOrder, limit: Option<usize>) -> Self {
        Self {
            name: name.into(),
            order,
            limit: limit.filter(|l| *l > 0),
        }
    }

    pub fn from_spec(spec: &NodeSpec) -> BuildResult<Self> {
        let order = match spec.config.get("order") {
            None => RankOrder::default(),
            Some(_) => spec
                .require_str("order")?
                .parse()
                .map_err(|reason| BuildError::InvalidConfig {
                    node: spec.name.clone(),
                    reason,
                })?,
        };
        Ok(Self::new(spec.name.clone(), order, spec.get_usize("limit")))
    }

    /// Apply the configured order and limit.
    pub fn rank(&self, mut candidates: Vec<Item>) -> Vec<Item> {
        match self.order {
            RankOrder::Desc => candidates.sort_by(|a, b| {
                b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal)
            }),
            RankOrder::Asc => candidates.sort_by(|a, b| {
                a.score.partial_cmp(&b.score).unwrap_or(Ordering::Equal)
            }),
            RankOrder::Shuffle => candidates.shuffle(&mut rand::rng()),
        }

        if let Some(limit) = self.limit {
            candidates.truncate(limit);
        }
        candidates
    }
}

#[async_trait]
impl Node for SimpleRankNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_type(&self) -> &str {
        "rank"
    }

    async fn execute(&self, ctx: Arc<RunContext>) -> Result<()> {
        let candidates = ctx.candidates();
        if candidates.is_empty() {
            return Ok(());
        }

        let ranked = self.rank(candidates);
        ctx.add_log(format!(
            "Rank ({}) completed. Strategy: {}, Result count: {}",
            self.name,
            self.order,
            ranked.len()
        ));
        ctx.update_candidates(ranked);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use workflow::User;

    fn scored(scores: &[f64]) -> Vec<Item> {
        scores
            .iter()
            .map(|s| Item::named(format!("item-{}", s), "test").with_score(*s))
            .collect()
    }

    fn scores(ctx: &RunContext) -> Vec<f64> {
        ctx.candidates().iter().map(|i| i.score).collect()
    }

    #[tokio::test]
    async fn test_desc_with_limit_keeps_top_two() {
        let ctx = Arc::new(RunContext::new(User::new("u1")));
        ctx.update_candidates(scored(&[3.0, 1.0, 2.0]));

        let node = SimpleRankNode::new("rank", RankOrder::Desc, Some(2));
        node.execute(ctx.clone()).await.unwrap();

        assert_eq!(scores(&ctx), vec![3.0, 2.0]);
        assert!(ctx
            .trace()
            .contains(&"Rank (rank) completed. Strategy: desc, Result count: 2".to_string()));
    }

    #[tokio::test]
    async fn test_asc_without_limit() {
        let ctx = Arc::new(RunContext::new(User::new("u1")));
        ctx.update_candidates(scored(&[3.0, 1.0, 2.0]));

        SimpleRankNode::new("rank", RankOrder::Asc, None)
            .execute(ctx.clone())
            .await
            .unwrap();
        assert_eq!(scores(&ctx), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_shuffle_keeps_every_item() {
        let node = SimpleRankNode::new("rank", RankOrder::Shuffle, None);
        let mut ranked: Vec<f64> = node.rank(scored(&[1.0, 2.0, 3.0, 4.0])).iter().map(|i| i.score).collect();
        ranked.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(ranked, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_nan_scores_do_not_panic() {
        let node = SimpleRankNode::new("rank", RankOrder::Desc, None);
        let ranked = node.rank(scored(&[f64::NAN, 0.8]));
        assert_eq!(ranked.len(), 2);
    }

    #[test]
    fn test_from_spec() {
        let spec = NodeSpec::new("r", "rank_simple")
            .with_config("order", "asc")
            .with_config("limit", 5);
        let node = SimpleRankNode::from_spec(&spec).unwrap();
        assert_eq!(node.order, RankOrder::Asc);
        assert_eq!(node.limit, Some(5));

        let defaults = SimpleRankNode::from_spec(&NodeSpec::new("r", "rank_simple")).unwrap();
        assert_eq!(defaults.order, RankOrder::Shuffle);
        assert_eq!(defaults.limit, None);

        let zero = SimpleRankNode::from_spec(&NodeSpec::new("r", "rank_simple").with_config("limit", 0)).unwrap();
        assert_eq!(zero.limit, None);

        let bad = NodeSpec::new("r", "rank_simple").with_config("order", "sideways");
        assert!(matches!(
            SimpleRankNode::from_spec(&bad),
            Err(BuildError::InvalidConfig { .. })
        ));
    }
}
