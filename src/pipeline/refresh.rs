// src/pipeline/refresh.rs

//! The staged refresh run: fetch → extract → resolve → merge.
//!
//! Stages execute strictly in sequence within one task. The fetch is the
//! only network suspension point; the merge transaction is short and not
//! covered by the fetch timeout.

use chrono::Utc;

use crate::config::{CompetitionConfig, NameOverride};
use crate::error::Result;
use crate::models::{ResolvedRow, ScrapeSummary};
use crate::services::{EntityResolver, FetchDocument, extract_medal_table};
use crate::storage::MedalStore;

/// Run the full refresh pipeline for one competition.
///
/// Returns the success summary; fetch, extraction, and storage failures
/// propagate so the coordinator can fold them into a failure journal
/// entry.
pub async fn run_refresh(
    fetcher: &dyn FetchDocument,
    store: &mut MedalStore,
    overrides: &[NameOverride],
    competition: &CompetitionConfig,
) -> Result<ScrapeSummary> {
    log::info!(
        "Refreshing medals for {} from {}",
        competition.id,
        competition.source_url
    );

    let html = fetcher.fetch(&competition.source_url).await?;
    let raw_rows = extract_medal_table(&html)?;
    log::info!(
        "Extracted {} medal rows for {}",
        raw_rows.len(),
        competition.id
    );

    let entities = store.lookup_entities(&competition.id)?;
    let resolver = EntityResolver::new(overrides, &entities);

    let mut resolved = Vec::with_capacity(raw_rows.len());
    let mut unresolved = Vec::new();
    for row in &raw_rows {
        match resolver.resolve(&row.name) {
            Some(code) => resolved.push(ResolvedRow {
                code: code.to_string(),
                name: row.name.clone(),
                gold: row.gold,
                silver: row.silver,
                bronze: row.bronze,
            }),
            None => unresolved.push(row.name.clone()),
        }
    }

    let outcome = store.merge_batch(&competition.id, &resolved)?;
    unresolved.extend(outcome.unmatched);

    Ok(ScrapeSummary {
        timestamp: Utc::now(),
        success: true,
        fetched_count: raw_rows.len(),
        updated_count: outcome.updated,
        unresolved,
        changed: outcome.changed,
        error: None,
    })
}
