// src/pipeline/coordinator.rs

//! Single-flight refresh coordination.
//!
//! The lock is a persisted record, not an in-memory mutex: the refresh
//! runs in a detached background task that may outlive the triggering
//! caller's state. The coordinator is the only writer of the lock and
//! clears it on every exit path of the task. If the process dies while
//! the lock is held it stays wedged until an operator clears it (`unlock`
//! in the CLI); there is no expiry.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::{CompetitionConfig, Config};
use crate::error::{AppError, Result};
use crate::models::ScrapeSummary;
use crate::services::FetchDocument;
use crate::storage::MedalStore;
use crate::utils::parse_stored_timestamp;

use super::refresh::run_refresh;
use super::staleness::{Staleness, check_staleness};

/// What a trigger call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Data was stale and a background refresh was launched
    Started,
    /// A refresh is already underway; no action taken
    AlreadyRefreshing,
    /// Data is fresh; no action taken
    Fresh,
}

/// Snapshot of one competition's refresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshStatus {
    pub in_progress: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Coordinates staleness checks and single-flight background refreshes.
///
/// All methods on the caller's path are fast local store reads plus, at
/// most, one conditional lock write and a task spawn; nothing here waits
/// on the network.
pub struct RefreshCoordinator {
    config: Arc<Config>,
    fetcher: Arc<dyn FetchDocument>,
    store: MedalStore,
}

impl RefreshCoordinator {
    /// Open a coordinator over the configured store.
    pub fn new(config: Arc<Config>, fetcher: Arc<dyn FetchDocument>) -> Result<Self> {
        let store = MedalStore::open(&config.sync.db_path)?;
        Ok(Self {
            config,
            fetcher,
            store,
        })
    }

    /// Whether a competition's data is stale, and when it was last updated.
    pub fn is_stale(&self, competition_id: &str) -> Result<Staleness> {
        let competition = self.config.competition(competition_id)?;
        let threshold = self.config.stale_after_secs(competition);
        check_staleness(&self.store, competition_id, threshold)
    }

    /// Launch a background refresh if the data is stale and no refresh is
    /// in flight. Idempotent and non-blocking.
    ///
    /// The lock is flipped synchronously before this returns, so a second
    /// near-simultaneous call observes it held and no-ops.
    pub fn trigger_refresh_if_needed(&self, competition_id: &str) -> Result<TriggerOutcome> {
        let competition = self.config.competition(competition_id)?.clone();

        if !self.is_stale(competition_id)?.stale {
            return Ok(TriggerOutcome::Fresh);
        }

        if !self.store.try_acquire_refresh_lock(competition_id)? {
            log::debug!("Refresh already in progress for {competition_id}");
            return Ok(TriggerOutcome::AlreadyRefreshing);
        }

        log::info!("Data stale for {competition_id}, launching background refresh");

        let config = Arc::clone(&self.config);
        let fetcher = Arc::clone(&self.fetcher);
        let db_path = self.store.path().to_path_buf();
        tokio::spawn(async move {
            run_locked_refresh(config, fetcher, db_path, competition).await;
        });

        Ok(TriggerOutcome::Started)
    }

    /// Current refresh state for one competition.
    pub fn refresh_status(&self, competition_id: &str) -> Result<RefreshStatus> {
        let in_progress = self.store.refresh_in_progress(competition_id)?;
        let last_updated = self
            .store
            .latest_update(competition_id)?
            .as_deref()
            .and_then(parse_stored_timestamp);
        Ok(RefreshStatus {
            in_progress,
            last_updated,
        })
    }

    /// Outcome of the most recent refresh attempt, if any.
    pub fn last_scrape_summary(&self, competition_id: &str) -> Result<Option<ScrapeSummary>> {
        self.store.read_journal(competition_id)
    }

    /// Run a refresh immediately, regardless of staleness, and wait for
    /// it. Still respects the single-flight lock.
    pub async fn run_refresh_now(&self, competition_id: &str) -> Result<ScrapeSummary> {
        let competition = self.config.competition(competition_id)?.clone();

        if !self.store.try_acquire_refresh_lock(competition_id)? {
            return Err(AppError::validation(format!(
                "Refresh already in progress for {competition_id}"
            )));
        }

        let summary = run_locked_refresh(
            Arc::clone(&self.config),
            Arc::clone(&self.fetcher),
            self.store.path().to_path_buf(),
            competition,
        )
        .await;
        Ok(summary)
    }

    /// Forcibly clear a wedged refresh lock. Operator escape hatch for
    /// the process-crash case.
    pub fn clear_refresh_lock(&self, competition_id: &str) -> Result<()> {
        self.store.release_refresh_lock(competition_id)
    }
}

/// Body of the background task. Assumes the lock is held; writes the
/// journal and clears the lock in every exit path.
async fn run_locked_refresh(
    config: Arc<Config>,
    fetcher: Arc<dyn FetchDocument>,
    db_path: PathBuf,
    competition: CompetitionConfig,
) -> ScrapeSummary {
    // Own connection: the triggering caller's handle may be torn down
    // before this task finishes.
    let mut store = match MedalStore::open(&db_path) {
        Ok(store) => store,
        Err(e) => {
            // Without a store there is no way to journal or unlock.
            log::error!("Background refresh could not open store at {db_path:?}: {e}");
            return ScrapeSummary::failure(&e);
        }
    };

    let summary = match run_refresh(
        fetcher.as_ref(),
        &mut store,
        &config.overrides,
        &competition,
    )
    .await
    {
        Ok(summary) => summary,
        Err(e) => {
            log::error!("Refresh failed for {}: {e}", competition.id);
            ScrapeSummary::failure(&e)
        }
    };

    if let Err(e) = store.write_journal(&competition.id, &summary) {
        log::error!("Failed to write scrape journal for {}: {e}", competition.id);
    }
    if let Err(e) = store.release_refresh_lock(&competition.id) {
        log::error!("Failed to release refresh lock for {}: {e}", competition.id);
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SyncConfig;
    use crate::error::AppError;
    use crate::models::Entity;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    const COMP: &str = "winter-2026";

    /// Serves a fixed document after a short delay, counting fetches.
    struct StubFetcher {
        body: Option<String>,
        fetches: AtomicUsize,
    }

    impl StubFetcher {
        fn ok(body: &str) -> Self {
            Self {
                body: Some(body.to_string()),
                fetches: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                body: None,
                fetches: AtomicUsize::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FetchDocument for StubFetcher {
        async fn fetch(&self, url: &str) -> crate::error::Result<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            match &self.body {
                Some(body) => Ok(body.clone()),
                None => Err(AppError::fetch(url, "connection refused")),
            }
        }
    }

    const FIVE_ROW_TABLE: &str = "<table class=\"wikitable\">\
        <tr><th>Rank</th><th>Team</th><th>Gold</th><th>Silver</th><th>Bronze</th><th>Total</th></tr>\
        <tr><td>1</td><th scope=\"row\"><a>Norway</a></th><td>16</td><td>8</td><td>13</td><td>37</td></tr>\
        <tr><td>2</td><th scope=\"row\"><a>Germany</a></th><td>12</td><td>10</td><td>5</td><td>27</td></tr>\
        <tr><td>3</td><th scope=\"row\"><a>United States</a>*</th><td>8</td><td>10</td><td>7</td><td>25</td></tr>\
        <tr><td>4</td><th scope=\"row\"><a>Sweden</a></th><td>8</td><td>5</td><td>5</td><td>18</td></tr>\
        <tr><td>5</td><th scope=\"row\"><a>Ruritania</a></th><td>7</td><td>1</td><td>6</td><td>14</td></tr>\
        </table>";

    fn catalog() -> Vec<Entity> {
        [
            ("NOR", "Norway"),
            ("GER", "Germany"),
            ("USA", "United States of America"),
            ("SWE", "Sweden"),
        ]
        .iter()
        .map(|(code, name)| Entity {
            code: code.to_string(),
            name: name.to_string(),
        })
        .collect()
    }

    fn test_config(tmp: &TempDir) -> Arc<Config> {
        let db_path = tmp.path().join("medals.db");
        Arc::new(Config {
            sync: SyncConfig {
                stale_after_secs: 900,
                db_path: db_path.to_string_lossy().into_owned(),
            },
            competitions: vec![CompetitionConfig {
                id: COMP.to_string(),
                name: "2026 Winter Games".to_string(),
                source_url: "https://example.invalid/medal_table".to_string(),
                stale_after_secs: None,
            }],
            ..Config::default()
        })
    }

    fn coordinator(config: Arc<Config>, fetcher: Arc<StubFetcher>) -> RefreshCoordinator {
        let mut store = MedalStore::open(&config.sync.db_path).unwrap();
        store.seed_entities(COMP, &catalog()).unwrap();
        RefreshCoordinator::new(config, fetcher).unwrap()
    }

    async fn wait_until_idle(coordinator: &RefreshCoordinator) {
        for _ in 0..200 {
            if !coordinator.refresh_status(COMP).unwrap().in_progress {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("refresh did not finish");
    }

    #[tokio::test]
    async fn test_trigger_runs_pipeline_once() {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::ok(FIVE_ROW_TABLE));
        let coordinator = coordinator(test_config(&tmp), Arc::clone(&fetcher));

        // Two near-simultaneous triggers: the lock flips synchronously in
        // the first call, so the second must observe it held.
        let first = coordinator.trigger_refresh_if_needed(COMP).unwrap();
        let second = coordinator.trigger_refresh_if_needed(COMP).unwrap();
        assert_eq!(first, TriggerOutcome::Started);
        assert_eq!(second, TriggerOutcome::AlreadyRefreshing);

        wait_until_idle(&coordinator).await;
        assert_eq!(fetcher.fetch_count(), 1);

        // Journal reflects the scenario: 5 fetched, 4 merged, 1 unresolved.
        let summary = coordinator.last_scrape_summary(COMP).unwrap().unwrap();
        assert!(summary.success);
        assert_eq!(summary.fetched_count, 5);
        assert_eq!(summary.updated_count, 4);
        assert_eq!(summary.unresolved, vec!["Ruritania".to_string()]);
        assert!(summary.changed);
    }

    #[tokio::test]
    async fn test_fresh_after_successful_refresh() {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::ok(FIVE_ROW_TABLE));
        let coordinator = coordinator(test_config(&tmp), fetcher);

        assert!(coordinator.is_stale(COMP).unwrap().stale);

        coordinator.trigger_refresh_if_needed(COMP).unwrap();
        wait_until_idle(&coordinator).await;

        let staleness = coordinator.is_stale(COMP).unwrap();
        assert!(!staleness.stale);
        assert!(staleness.last_updated.is_some());

        // And a trigger on fresh data is a no-op.
        assert_eq!(
            coordinator.trigger_refresh_if_needed(COMP).unwrap(),
            TriggerOutcome::Fresh
        );
    }

    #[tokio::test]
    async fn test_failed_fetch_clears_lock_and_journals_failure() {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::failing());
        let coordinator = coordinator(test_config(&tmp), fetcher);

        assert_eq!(
            coordinator.trigger_refresh_if_needed(COMP).unwrap(),
            TriggerOutcome::Started
        );
        wait_until_idle(&coordinator).await;

        let summary = coordinator.last_scrape_summary(COMP).unwrap().unwrap();
        assert!(!summary.success);
        assert!(summary.error.is_some());
        assert!(!summary.changed);

        // Failure left the lock released; data is still stale, so the
        // next check can launch a new attempt.
        assert_eq!(
            coordinator.trigger_refresh_if_needed(COMP).unwrap(),
            TriggerOutcome::Started
        );
        wait_until_idle(&coordinator).await;
    }

    #[tokio::test]
    async fn test_second_refresh_of_same_data_not_changed() {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::ok(FIVE_ROW_TABLE));
        let coordinator = coordinator(test_config(&tmp), fetcher);

        let first = coordinator.run_refresh_now(COMP).await.unwrap();
        assert!(first.changed);

        let second = coordinator.run_refresh_now(COMP).await.unwrap();
        assert!(!second.changed);
        assert_eq!(second.updated_count, 4);
    }

    #[tokio::test]
    async fn test_run_refresh_now_respects_lock() {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::ok(FIVE_ROW_TABLE));
        let coordinator = coordinator(test_config(&tmp), fetcher);

        coordinator.trigger_refresh_if_needed(COMP).unwrap();
        let err = coordinator.run_refresh_now(COMP).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        wait_until_idle(&coordinator).await;
    }

    #[tokio::test]
    async fn test_clear_refresh_lock() {
        let tmp = TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::ok(FIVE_ROW_TABLE));
        let coordinator = coordinator(test_config(&tmp), fetcher);

        // Simulate a wedged lock from a crashed process.
        let store = MedalStore::open(&coordinator.config.sync.db_path).unwrap();
        assert!(store.try_acquire_refresh_lock(COMP).unwrap());

        coordinator.clear_refresh_lock(COMP).unwrap();
        assert!(!coordinator.refresh_status(COMP).unwrap().in_progress);
    }
}
