//! One exposure: user U was shown item X in domain D at time T.

use serde::{Deserialize, Serialize};

/// A single recommendation history entry, one JSON object per line on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub user_id: String,
    pub item_name: String,

    /// e.g. "music", "movie"
    pub domain: String,

    /// Unix seconds
    pub timestamp: i64,
}

impl Record {
    pub fn new(
        user_id: impl Into<String>,
        item_name: impl Into<String>,
        domain: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            item_name: item_name.into(),
            domain: domain.into(),
            timestamp,
        }
    }

    /// Parse one line of the history file. Blank lines yield `None`.
    pub fn parse_line(line: &str) -> Option<serde_json::Result<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(serde_json::from_str(line))
    }

    pub fn matches(&self, user_id: &str, domain: &str, cutoff: i64) -> bool {
        self.user_id == user_id && self.domain == domain && self.timestamp >= cutoff
    }
}

/// Unix timestamp `days` days before `now`.
pub fn cutoff_for(now: i64, days: u32) -> i64 {
    now - i64::from(days) * 24 * 60 * 60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let line = r#"{"user_id":"u1","item_name":"Song","domain":"music","timestamp":100}"#;
        let record = Record::parse_line(line).unwrap().unwrap();
        assert_eq!(record, Record::new("u1", "Song", "music", 100));

        assert!(Record::parse_line("   ").is_none());
        assert!(Record::parse_line("{broken").unwrap().is_err());
    }

    #[test]
    fn test_matches_respects_cutoff() {
        let record = Record::new("u1", "Song", "music", 1_000);
        assert!(record.matches("u1", "music", 1_000));
        assert!(!record.matches("u1", "music", 1_001));
        assert!(!record.matches("u2", "music", 0));
        assert!(!record.matches("u1", "movie", 0));
    }

    #[test]
    fn test_cutoff_for() {
        assert_eq!(cutoff_for(10 * 86_400, 7), 3 * 86_400);
        assert_eq!(cutoff_for(500, 0), 500);
    }
}
