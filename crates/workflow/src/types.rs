//! Core domain types shared by every node.
//!
//! - `Item`: one recommendation candidate
//! - `User`: the caller's identity and stated favorites

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A recommendation candidate (a song, a film, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,

    /// Ranking key. Direction is chosen by the rank node.
    #[serde(default)]
    pub score: f64,

    /// Which recall node produced this item (e.g. "llm_gpt4", "user_favorite")
    #[serde(default)]
    pub source: String,

    /// Node specific annotations such as `is_mix_in`
    #[serde(rename = "meta_data", default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Item {
    /// Create an item whose id is its name.
    pub fn named(name: impl Into<String>, source: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            score: 0.0,
            source: source.into(),
            metadata: Map::new(),
        }
    }

    /// Set the score (builder pattern).
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = score;
        self
    }

    /// Attach a metadata entry (builder pattern).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A caller of the recommendation service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,

    /// Bearer token; never serialized back out
    #[serde(skip_serializing, default)]
    pub token: String,

    #[serde(default)]
    pub name: String,

    /// Used to build recall prompts and to avoid re-recommending
    #[serde(default)]
    pub favorites: Vec<String>,
}

impl User {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_favorites<I, S>(mut self, favorites: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.favorites = favorites.into_iter().map(Into::into).collect();
        self
    }
}
