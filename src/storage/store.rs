// src/storage/store.rs

//! SQLite-backed medal store.
//!
//! The store owns all SQL. The merge engine lives here as
//! [`MedalStore::merge_batch`] because its atomicity contract is a
//! property of the storage layer: either every resolvable row in a batch
//! is persisted or none are.
//!
//! Each `MedalStore` wraps one connection. The refresh coordinator opens
//! a separate store per background task rather than sharing the
//! request-side handle; WAL mode makes the concurrent readers cheap.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _, params};

use crate::error::Result;
use crate::models::{Entity, MedalRecord, ResolvedRow, ScrapeSummary, points_for};
use crate::utils::time::format_timestamp;

use super::schema::SCHEMA;

/// Result of applying one resolved batch to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Rows upserted
    pub updated: usize,

    /// Display names whose resolved code is missing from the catalog
    pub unmatched: Vec<String>,

    /// True iff some persisted gold/silver/bronze value actually changed
    /// (or a new non-zero record appeared); a refresh that re-writes
    /// identical counts does not count as a change.
    pub changed: bool,
}

/// A medal store backed by a single SQLite file.
pub struct MedalStore {
    conn: Connection,
    path: PathBuf,
}

impl MedalStore {
    /// Open (or create) a store at `path` and run schema initialisation.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        // journal_mode returns the resulting mode as a row; not an error.
        conn.pragma_update(None, "journal_mode", "WAL").ok();
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, path })
    }

    /// Path this store was opened from, for opening sibling connections.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── Catalog ──────────────────────────────────────────────────────────

    /// Replace the catalog entries for one competition.
    ///
    /// Catalog setup only; never called by the refresh pipeline.
    pub fn seed_entities(&mut self, competition: &str, entities: &[Entity]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        for entity in entities {
            tx.execute(
                "INSERT INTO entities (competition_id, code, name)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (competition_id, code) DO UPDATE SET name = excluded.name",
                params![competition, entity.code, entity.name],
            )?;
        }
        tx.commit()?;
        Ok(entities.len())
    }

    /// All catalog entities for one competition.
    pub fn lookup_entities(&self, competition: &str) -> Result<Vec<Entity>> {
        let mut stmt = self.conn.prepare(
            "SELECT code, name FROM entities WHERE competition_id = ?1 ORDER BY code",
        )?;
        let entities = stmt
            .query_map(params![competition], |row| {
                Ok(Entity {
                    code: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entities)
    }

    // ── Medal records ────────────────────────────────────────────────────

    /// One medal record, if present.
    pub fn medal(&self, competition: &str, code: &str) -> Result<Option<MedalRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT code, gold, silver, bronze, points, updated_at
                 FROM medals WHERE competition_id = ?1 AND code = ?2",
                params![competition, code],
                map_medal_row,
            )
            .optional()?;
        Ok(record)
    }

    /// All medal records for one competition, highest points first.
    pub fn medals(&self, competition: &str) -> Result<Vec<MedalRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT code, gold, silver, bronze, points, updated_at
             FROM medals WHERE competition_id = ?1
             ORDER BY points DESC, gold DESC, code",
        )?;
        let records = stmt
            .query_map(params![competition], map_medal_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// Most recent medal-record timestamp for a competition, as stored.
    pub fn latest_update(&self, competition: &str) -> Result<Option<String>> {
        let raw: Option<String> = self.conn.query_row(
            "SELECT MAX(updated_at) FROM medals WHERE competition_id = ?1",
            params![competition],
            |row| row.get(0),
        )?;
        Ok(raw)
    }

    // ── Merge engine ─────────────────────────────────────────────────────

    /// Apply a resolved batch inside one transaction.
    ///
    /// Rows whose code is missing from the catalog are collected as
    /// unmatched and not merged. Any storage error rolls back the whole
    /// batch.
    pub fn merge_batch(&mut self, competition: &str, rows: &[ResolvedRow]) -> Result<MergeOutcome> {
        let now = format_timestamp(Utc::now());
        let mut outcome = MergeOutcome::default();

        let tx = self.conn.transaction()?;
        for row in rows {
            let in_catalog: bool = tx
                .query_row(
                    "SELECT 1 FROM entities WHERE competition_id = ?1 AND code = ?2",
                    params![competition, row.code],
                    |_| Ok(true),
                )
                .optional()?
                .unwrap_or(false);

            if !in_catalog {
                log::warn!("Entity not found in catalog: {} ({})", row.name, row.code);
                outcome.unmatched.push(format!("{} ({})", row.name, row.code));
                continue;
            }

            let existing: Option<(u32, u32, u32)> = tx
                .query_row(
                    "SELECT gold, silver, bronze FROM medals
                     WHERE competition_id = ?1 AND code = ?2",
                    params![competition, row.code],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
                )
                .optional()?;

            // points is derived, so change detection compares the three
            // source counts only.
            let row_changed = match existing {
                Some((gold, silver, bronze)) => {
                    gold != row.gold || silver != row.silver || bronze != row.bronze
                }
                None => row.gold > 0 || row.silver > 0 || row.bronze > 0,
            };
            outcome.changed |= row_changed;

            tx.execute(
                "INSERT INTO medals
                     (competition_id, code, gold, silver, bronze, points, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (competition_id, code) DO UPDATE SET
                     gold = excluded.gold,
                     silver = excluded.silver,
                     bronze = excluded.bronze,
                     points = excluded.points,
                     updated_at = excluded.updated_at",
                params![
                    competition,
                    row.code,
                    row.gold,
                    row.silver,
                    row.bronze,
                    points_for(row.gold, row.silver, row.bronze),
                    now,
                ],
            )?;
            outcome.updated += 1;
        }
        tx.commit()?;

        log::info!(
            "Merged {} medal rows for {} (changed: {}, unmatched: {})",
            outcome.updated,
            competition,
            outcome.changed,
            outcome.unmatched.len()
        );
        Ok(outcome)
    }

    // ── Refresh lock ─────────────────────────────────────────────────────

    /// Try to flip the per-competition refresh lock from idle to held.
    ///
    /// Atomic at the storage layer: the conditional upsert changes a row
    /// only when the lock is absent or released, so exactly one of two
    /// near-simultaneous callers observes `true`.
    pub fn try_acquire_refresh_lock(&self, competition: &str) -> Result<bool> {
        let changed = self.conn.execute(
            "INSERT INTO sync_meta (key, value, updated_at) VALUES (?1, '1', ?2)
             ON CONFLICT (key) DO UPDATE SET
                 value = '1',
                 updated_at = excluded.updated_at
             WHERE sync_meta.value = '0'",
            params![lock_key(competition), format_timestamp(Utc::now())],
        )?;
        Ok(changed == 1)
    }

    /// Release the refresh lock. Safe to call when not held.
    pub fn release_refresh_lock(&self, competition: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_meta (key, value, updated_at) VALUES (?1, '0', ?2)
             ON CONFLICT (key) DO UPDATE SET
                 value = '0',
                 updated_at = excluded.updated_at",
            params![lock_key(competition), format_timestamp(Utc::now())],
        )?;
        Ok(())
    }

    /// Whether a refresh is currently marked as running.
    pub fn refresh_in_progress(&self, competition: &str) -> Result<bool> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM sync_meta WHERE key = ?1",
                params![lock_key(competition)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.as_deref() == Some("1"))
    }

    // ── Scrape journal ───────────────────────────────────────────────────

    /// Overwrite the journal entry for one competition.
    pub fn write_journal(&self, competition: &str, summary: &ScrapeSummary) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_meta (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
            params![
                journal_key(competition),
                serde_json::to_string(summary)?,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }

    /// Latest journal entry, or `None` if never scraped.
    pub fn read_journal(&self, competition: &str) -> Result<Option<ScrapeSummary>> {
        let value: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM sync_meta WHERE key = ?1",
                params![journal_key(competition)],
                |row| row.get(0),
            )
            .optional()?;

        match value {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

fn lock_key(competition: &str) -> String {
    format!("medals_refreshing_{competition}")
}

fn journal_key(competition: &str) -> String {
    format!("medals_last_scrape_{competition}")
}

fn map_medal_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MedalRecord> {
    Ok(MedalRecord {
        code: row.get(0)?,
        gold: row.get(1)?,
        silver: row.get(2)?,
        bronze: row.get(3)?,
        points: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    const COMP: &str = "winter-2026";

    fn open_store(tmp: &TempDir) -> MedalStore {
        let mut store = MedalStore::open(tmp.path().join("medals.db")).unwrap();
        store
            .seed_entities(
                COMP,
                &[
                    Entity {
                        code: "NOR".to_string(),
                        name: "Norway".to_string(),
                    },
                    Entity {
                        code: "GER".to_string(),
                        name: "Germany".to_string(),
                    },
                ],
            )
            .unwrap();
        store
    }

    fn row(code: &str, gold: u32, silver: u32, bronze: u32) -> ResolvedRow {
        ResolvedRow {
            code: code.to_string(),
            name: code.to_string(),
            gold,
            silver,
            bronze,
        }
    }

    #[test]
    fn test_merge_computes_points() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);

        store.merge_batch(COMP, &[row("NOR", 2, 3, 4)]).unwrap();

        let record = store.medal(COMP, "NOR").unwrap().unwrap();
        assert_eq!(record.points, 2 * 3 + 3 * 2 + 4);
        assert_eq!(
            record.points,
            points_for(record.gold, record.silver, record.bronze)
        );
    }

    #[test]
    fn test_merge_same_batch_twice_not_changed() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);
        let batch = [row("NOR", 1, 0, 0), row("GER", 0, 2, 1)];

        let first = store.merge_batch(COMP, &batch).unwrap();
        assert!(first.changed);
        assert_eq!(first.updated, 2);

        let second = store.merge_batch(COMP, &batch).unwrap();
        assert!(!second.changed);
        assert_eq!(second.updated, 2);
    }

    #[test]
    fn test_merge_detects_count_change() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);

        store.merge_batch(COMP, &[row("NOR", 1, 0, 0)]).unwrap();
        let outcome = store.merge_batch(COMP, &[row("NOR", 1, 1, 0)]).unwrap();
        assert!(outcome.changed);
    }

    #[test]
    fn test_new_all_zero_record_not_a_change() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);

        let outcome = store.merge_batch(COMP, &[row("NOR", 0, 0, 0)]).unwrap();
        assert!(!outcome.changed);
        assert_eq!(outcome.updated, 1);
    }

    #[test]
    fn test_unmatched_code_reported_not_merged() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);

        let outcome = store
            .merge_batch(COMP, &[row("NOR", 1, 0, 0), row("XXX", 5, 5, 5)])
            .unwrap();
        assert_eq!(outcome.updated, 1);
        assert_eq!(outcome.unmatched, vec!["XXX (XXX)".to_string()]);
        assert!(store.medal(COMP, "XXX").unwrap().is_none());
    }

    #[test]
    fn test_latest_update_none_without_records() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        assert!(store.latest_update(COMP).unwrap().is_none());
    }

    #[test]
    fn test_medals_ordered_by_points() {
        let tmp = TempDir::new().unwrap();
        let mut store = open_store(&tmp);

        store
            .merge_batch(COMP, &[row("NOR", 0, 0, 1), row("GER", 3, 0, 0)])
            .unwrap();

        let records = store.medals(COMP).unwrap();
        assert_eq!(records[0].code, "GER");
        assert_eq!(records[1].code, "NOR");
    }

    #[test]
    fn test_lock_single_flight() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);

        assert!(store.try_acquire_refresh_lock(COMP).unwrap());
        assert!(store.refresh_in_progress(COMP).unwrap());

        // Second acquire observes the lock already held.
        assert!(!store.try_acquire_refresh_lock(COMP).unwrap());

        store.release_refresh_lock(COMP).unwrap();
        assert!(!store.refresh_in_progress(COMP).unwrap());
        assert!(store.try_acquire_refresh_lock(COMP).unwrap());
    }

    #[test]
    fn test_lock_acquire_visible_across_connections() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        assert!(store.try_acquire_refresh_lock(COMP).unwrap());

        // A sibling connection, as the background task would open.
        let other = MedalStore::open(store.path()).unwrap();
        assert!(other.refresh_in_progress(COMP).unwrap());
        assert!(!other.try_acquire_refresh_lock(COMP).unwrap());
    }

    #[test]
    fn test_locks_are_per_competition() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);

        assert!(store.try_acquire_refresh_lock("winter-2026").unwrap());
        assert!(store.try_acquire_refresh_lock("summer-2028").unwrap());
    }

    #[test]
    fn test_journal_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&tmp);
        assert!(store.read_journal(COMP).unwrap().is_none());

        let summary = ScrapeSummary {
            timestamp: Utc::now(),
            success: true,
            fetched_count: 5,
            updated_count: 4,
            unresolved: vec!["Ruritania".to_string()],
            changed: true,
            error: None,
        };
        store.write_journal(COMP, &summary).unwrap();

        let back = store.read_journal(COMP).unwrap().unwrap();
        assert_eq!(back, summary);

        // Overwritten on the next attempt, no history kept.
        let failure = ScrapeSummary::failure("fetch timed out");
        store.write_journal(COMP, &failure).unwrap();
        let back = store.read_journal(COMP).unwrap().unwrap();
        assert!(!back.success);
    }
}
