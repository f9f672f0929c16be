// src/models/journal.rs

//! Scrape journal entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of the most recent refresh attempt for one competition.
///
/// Overwritten on every attempt; no history is retained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeSummary {
    /// When the attempt finished
    pub timestamp: DateTime<Utc>,

    /// Whether the full pipeline ran to completion
    pub success: bool,

    /// Rows extracted from the source document
    #[serde(default)]
    pub fetched_count: usize,

    /// Rows actually merged into the store
    #[serde(default)]
    pub updated_count: usize,

    /// Source names that resolved to no catalog entity
    #[serde(default)]
    pub unresolved: Vec<String>,

    /// Whether any persisted gold/silver/bronze value actually changed
    #[serde(default)]
    pub changed: bool,

    /// Failure message when `success` is false
    #[serde(default)]
    pub error: Option<String>,
}

impl ScrapeSummary {
    /// Build a failure entry carrying only the error message.
    pub fn failure(error: impl ToString) -> Self {
        Self {
            timestamp: Utc::now(),
            success: false,
            fetched_count: 0,
            updated_count: 0,
            unresolved: Vec::new(),
            changed: false,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip() {
        let summary = ScrapeSummary {
            timestamp: Utc::now(),
            success: true,
            fetched_count: 5,
            updated_count: 4,
            unresolved: vec!["Ruritania".to_string()],
            changed: true,
            error: None,
        };

        let json = serde_json::to_string(&summary).unwrap();
        let back: ScrapeSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn test_failure_entry() {
        let summary = ScrapeSummary::failure("boom");
        assert!(!summary.success);
        assert_eq!(summary.error.as_deref(), Some("boom"));
        assert_eq!(summary.updated_count, 0);
        assert!(!summary.changed);
    }

    #[test]
    fn test_missing_fields_default() {
        // Journal values written by older tooling may omit newer fields.
        let json = r#"{"timestamp":"2026-02-08T12:00:00Z","success":true}"#;
        let summary: ScrapeSummary = serde_json::from_str(json).unwrap();
        assert!(summary.success);
        assert_eq!(summary.fetched_count, 0);
        assert!(summary.unresolved.is_empty());
        assert!(summary.error.is_none());
    }
}
