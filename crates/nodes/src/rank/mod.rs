//! Rank nodes.

pub mod mix_favorites;
pub mod simple;

// Re-export for convenience
pub use mix_favorites::MixFavoritesRankNode;
pub use simple::{RankOrder, SimpleRankNode};
