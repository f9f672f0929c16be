// src/pipeline/staleness.rs

//! Staleness detection over persisted medal timestamps.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::storage::MedalStore;
use crate::utils::parse_stored_timestamp;

/// Result of a staleness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Staleness {
    /// Whether a refresh is due
    pub stale: bool,

    /// Most recent medal-record timestamp, if any parsed
    pub last_updated: Option<DateTime<Utc>>,
}

/// Check whether a competition's medal data is older than `threshold_secs`.
///
/// A competition with no medal records at all is stale (never updated).
/// An unparseable stored timestamp is treated the same way: the next
/// refresh rewrites it in canonical form.
pub fn check_staleness(
    store: &MedalStore,
    competition: &str,
    threshold_secs: u64,
) -> Result<Staleness> {
    let Some(raw) = store.latest_update(competition)? else {
        return Ok(Staleness {
            stale: true,
            last_updated: None,
        });
    };

    let Some(last_updated) = parse_stored_timestamp(&raw) else {
        log::warn!("Unparseable updated_at '{raw}' for {competition}, treating as stale");
        return Ok(Staleness {
            stale: true,
            last_updated: None,
        });
    };

    let elapsed = Utc::now().signed_duration_since(last_updated);
    let stale = elapsed.num_seconds() > threshold_secs as i64;

    Ok(Staleness {
        stale,
        last_updated: Some(last_updated),
    })
}
