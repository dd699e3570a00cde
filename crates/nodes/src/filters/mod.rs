//! Filter nodes.
//!
//! Both filters drop candidates whose name is in a membership set and
//! leave an empty candidate set untouched.

pub mod favorites;
pub mod recent_history;

use std::collections::HashSet;

use workflow::Item;

// Re-export for convenience
pub use favorites::FavoritesFilterNode;
pub use recent_history::HistoryFilterNode;

/// Split `candidates` into the items to keep and the number removed.
pub(crate) fn remove_by_name(candidates: Vec<Item>, excluded: &HashSet<&str>) -> (Vec<Item>, usize) {
    let before = candidates.len();
    let kept: Vec<Item> = candidates
        .into_iter()
        .filter(|item| !excluded.contains(item.name.as_str()))
        .collect();
    let removed = before - kept.len();
    (kept, removed)
}
