//! # History Crate
//!
//! Append-only log of what each user has already been recommended, used to
//! avoid showing the same item twice within a lookback window.
//!
//! ## Main Components
//!
//! - **HistoryStore**: the narrow contract the pipeline depends on
//! - **FileHistoryStore**: JSONL file persistence with retention cleanup
//! - **MemoryHistoryStore**: in-process store for tests and dry runs
//!
//! ## Example Usage
//!
//! ```ignore
//! use history::{FileHistoryStore, HistoryStore};
//!
//! let store = FileHistoryStore::open("data/history.jsonl")?;
//! store.record("u1", "music", &["Blue in Green".to_string()])?;
//! let seen = store.recent("u1", "music", 7)?;
//! ```

pub mod error;
pub mod file_store;
pub mod record;

use std::sync::RwLock;

use chrono::Utc;

// Re-export commonly used types for convenience
pub use error::{HistoryError, Result};
pub use file_store::FileHistoryStore;
pub use record::Record;

/// Exposure history contract.
///
/// Implementations are shared across concurrent requests, hence `Send + Sync`.
pub trait HistoryStore: Send + Sync {
    /// Item names shown to `user_id` in `domain` within the last `days` days.
    fn recent(&self, user_id: &str, domain: &str, days: u32) -> Result<Vec<String>>;

    /// Record that `items` were shown to `user_id` in `domain` now.
    fn record(&self, user_id: &str, domain: &str, items: &[String]) -> Result<()>;
}

/// History kept only in memory.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    records: RwLock<Vec<Record>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records (builder pattern).
    pub fn with_records(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    pub fn records(&self) -> Vec<Record> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn recent(&self, user_id: &str, domain: &str, days: u32) -> Result<Vec<String>> {
        let records = self.records.read().map_err(|_| HistoryError::LockPoisoned)?;
        let cutoff = record::cutoff_for(Utc::now().timestamp(), days);
        Ok(records
            .iter()
            .filter(|r| r.matches(user_id, domain, cutoff))
            .map(|r| r.item_name.clone())
            .collect())
    }

    fn record(&self, user_id: &str, domain: &str, items: &[String]) -> Result<()> {
        let mut records = self.records.write().map_err(|_| HistoryError::LockPoisoned)?;
        let now = Utc::now().timestamp();
        records.extend(
            items
                .iter()
                .map(|item| Record::new(user_id, item.as_str(), domain, now)),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryHistoryStore::new();
        store.record("u1", "music", &["x".to_string(), "y".to_string()]).unwrap();

        assert_eq!(store.recent("u1", "music", 7).unwrap(), vec!["x", "y"]);
        assert!(store.recent("u1", "movie", 7).unwrap().is_empty());
        assert_eq!(store.records().len(), 2);
    }

    #[test]
    fn test_memory_store_seeded_records_respect_window() {
        let now = Utc::now().timestamp();
        let store = MemoryHistoryStore::with_records(vec![
            Record::new("u1", "ancient", "music", now - 100 * 86_400),
            Record::new("u1", "recent", "music", now),
        ]);
        assert_eq!(store.recent("u1", "music", 7).unwrap(), vec!["recent"]);
    }

    #[test]
    fn test_store_is_object_safe() {
        let store: std::sync::Arc<dyn HistoryStore> = std::sync::Arc::new(MemoryHistoryStore::new());
        assert!(store.recent("u1", "music", 1).unwrap().is_empty());
    }
}
