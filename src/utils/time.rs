// src/utils/time.rs

//! Timestamp parsing for values read back from the store.
//!
//! The persisted store does not guarantee a single timestamp format:
//! rows written by this crate carry RFC 3339 with an explicit offset,
//! while rows written by older tooling may be naive `YYYY-MM-DD HH:MM:SS`
//! strings. Naive timestamps are always interpreted as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Accepted naive formats, tried in order after RFC 3339 fails.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse a stored timestamp string into a UTC datetime.
///
/// Returns `None` if the value matches no known form.
pub fn parse_stored_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }

    None
}

/// Serialize a UTC datetime the way this crate writes it to the store.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339()
}
