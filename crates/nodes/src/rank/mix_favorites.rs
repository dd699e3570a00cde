//! Mixes a few of the user's own favorites back into the results.
//!
//! ## Algorithm
//! 1. Pick up to `mix_count` favorites at random
//! 2. Turn them into high scoring items tagged `is_mix_in`
//! 3. Append them to the candidates and shuffle the whole list

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rand::seq::{IndexedRandom, SliceRandom};
use workflow::{BuildResult, Item, Node, NodeSpec, RunContext};

/// Default number of favorites mixed in
pub const DEFAULT_MIX_COUNT: usize = 2;

/// Source tag for mixed-in items
pub const MIX_IN_SOURCE: &str = "user_favorite";

/// Score given to mixed-in items
pub const MIX_IN_SCORE: f64 = 100.0;

pub struct MixFavoritesRankNode {
    name: String,
    mix_count: usize,
}

impl MixFavoritesRankNode {
    pub fn new(name: impl Into<String>, mix_count: usize) -> Self {
        Self {
            name: name.into(),
            mix_count,
        }
    }

    /// `mix_count` defaults to 2 when absent or not positive.
    pub fn from_spec(spec: &NodeSpec) -> BuildResult<Self> {
        let mix_count = spec
            .get_usize("mix_count")
            .filter(|c| *c > 0)
            .unwrap_or(DEFAULT_MIX_COUNT);
        Ok(Self::new(spec.name.clone(), mix_count))
    }

    fn mix(&self, mut candidates: Vec<Item>, favorites: &[String]) -> (Vec<Item>, usize) {
        let mut rng = rand::rng();
        let picks: Vec<Item> = favorites
            .choose_multiple(&mut rng, self.mix_count)
            .map(|name| {
                Item::named(name.as_str(), MIX_IN_SOURCE)
                    .with_score(MIX_IN_SCORE)
                    .with_metadata("is_mix_in", true)
            })
            .collect();
        let injected = picks.len();

        candidates.extend(picks);
        candidates.shuffle(&mut rng);
        (candidates, injected)
    }
}

#[async_trait]
impl Node for MixFavoritesRankNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_type(&self) -> &str {
        "rank"
    }

    async fn execute(&self, ctx: Arc<RunContext>) -> Result<()> {
        let favorites = ctx.favorites();
        if favorites.is_empty() {
            return Ok(());
        }

        let (mixed, injected) = self.mix(ctx.candidates(), &favorites);
        ctx.update_candidates(mixed);
        ctx.add_log(format!("MixFavorites ({}) injected {} items", self.name, injected));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use workflow::User;

    #[tokio::test]
    async fn test_mix_injects_bounded_favorites() {
        let user = User::new("u1").with_favorites(["f1", "f2", "f3", "f4"]);
        let ctx = Arc::new(RunContext::new(user));
        ctx.update_candidates(vec![Item::named("a", "llm"), Item::named("b", "llm")]);

        MixFavoritesRankNode::new("mix", 2).execute(ctx.clone()).await.unwrap();

        let candidates = ctx.candidates();
        assert_eq!(candidates.len(), 4);

        let mixed: Vec<&Item> = candidates
            .iter()
            .filter(|i| i.metadata.get("is_mix_in") == Some(&Value::Bool(true)))
            .collect();
        assert_eq!(mixed.len(), 2);
        for item in mixed {
            assert_eq!(item.source, MIX_IN_SOURCE);
            assert_eq!(item.score, MIX_IN_SCORE);
            assert!(item.name.starts_with('f'));
        }
        assert!(ctx.trace().contains(&"MixFavorites (mix) injected 2 items".to_string()));
    }

    #[tokio::test]
    async fn test_mix_count_larger_than_favorites() {
        let ctx = Arc::new(RunContext::new(User::new("u1").with_favorites(["only"])));
        MixFavoritesRankNode::new("mix", 5).execute(ctx.clone()).await.unwrap();
        let candidates = ctx.candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "only");
    }

    #[tokio::test]
    async fn test_no_favorites_is_noop() {
        let ctx = Arc::new(RunContext::new(User::new("u1")));
        ctx.update_candidates(vec![Item::named("a", "llm")]);
        MixFavoritesRankNode::new("mix", 2).execute(ctx.clone()).await.unwrap();
        assert_eq!(ctx.candidates().len(), 1);
        assert!(ctx.trace().is_empty());
    }

    #[test]
    fn test_from_spec_default() {
        let node = MixFavoritesRankNode::from_spec(&NodeSpec::new("m", "rank_mix_favorites")).unwrap();
        assert_eq!(node.mix_count, DEFAULT_MIX_COUNT);

        let node = MixFavoritesRankNode::from_spec(
            &NodeSpec::new("m", "rank_mix_favorites").with_config("mix_count", 0),
        )
        .unwrap();
        assert_eq!(node.mix_count, DEFAULT_MIX_COUNT);

        let node = MixFavoritesRankNode::from_spec(
            &NodeSpec::new("m", "rank_mix_favorites").with_config("mix_count", 4),
        )
        .unwrap();
        assert_eq!(node.mix_count, 4);
    }
}
