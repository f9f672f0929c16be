// src/config.rs

//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP fetch behavior settings
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Staleness and store settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Competition definitions
    #[serde(default)]
    pub competitions: Vec<CompetitionConfig>,

    /// Entity-name override table for known naming mismatches
    #[serde(default = "defaults::overrides")]
    pub overrides: Vec<NameOverride>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.sync.stale_after_secs == 0 {
            return Err(AppError::validation("sync.stale_after_secs must be > 0"));
        }
        if self.sync.db_path.trim().is_empty() {
            return Err(AppError::validation("sync.db_path is empty"));
        }
        for competition in &self.competitions {
            if competition.id.trim().is_empty() {
                return Err(AppError::validation("competition id is empty"));
            }
            if url::Url::parse(&competition.source_url).is_err() {
                return Err(AppError::validation(format!(
                    "competition {} has an invalid source_url",
                    competition.id
                )));
            }
            if competition.stale_after_secs == Some(0) {
                return Err(AppError::validation(format!(
                    "competition {} stale_after_secs must be > 0",
                    competition.id
                )));
            }
        }
        for mapping in &self.overrides {
            if mapping.name.trim().is_empty() || mapping.code.trim().is_empty() {
                return Err(AppError::validation("override entries need name and code"));
            }
        }
        Ok(())
    }

    /// Look up a competition definition by identifier.
    pub fn competition(&self, id: &str) -> Result<&CompetitionConfig> {
        self.competitions
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::config(format!("Unknown competition: {id}")))
    }

    /// Effective staleness threshold for one competition, in seconds.
    pub fn stale_after_secs(&self, competition: &CompetitionConfig) -> u64 {
        competition
            .stale_after_secs
            .unwrap_or(self.sync.stale_after_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            sync: SyncConfig::default(),
            competitions: Vec::new(),
            overrides: defaults::overrides(),
        }
    }
}

/// HTTP fetch behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests; browser-like to avoid 403 blocking
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Accept header
    #[serde(default = "defaults::accept")]
    pub accept: String,

    /// Accept-Language header
    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            accept: defaults::accept(),
            accept_language: defaults::accept_language(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Staleness and store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Medal data older than this is considered stale, in seconds
    #[serde(default = "defaults::stale_after")]
    pub stale_after_secs: u64,

    /// Path to the SQLite database file
    #[serde(default = "defaults::db_path")]
    pub db_path: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: defaults::stale_after(),
            db_path: defaults::db_path(),
        }
    }
}

/// One medal-table universe scoped to a single Games instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionConfig {
    /// Stable competition identifier
    pub id: String,

    /// Human-readable display name
    pub name: String,

    /// URL of the external medal-table document
    pub source_url: String,

    /// Per-competition staleness threshold override, in seconds
    #[serde(default)]
    pub stale_after_secs: Option<u64>,
}

/// Mapping from a source display name to a canonical entity code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameOverride {
    /// Display name as it appears in the source, matched case-insensitively
    pub name: String,

    /// Canonical code in the catalog
    pub code: String,
}

/// Catalog seed file: entities per competition, used by `medalsync seed`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Catalog {
    #[serde(default)]
    pub competitions: Vec<CatalogCompetition>,
}

impl Catalog {
    /// Load a catalog seed from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}

/// One competition's entity list in a catalog seed file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogCompetition {
    /// Competition identifier, matching `[[competitions]].id` in the config
    pub id: String,

    #[serde(default)]
    pub entities: Vec<crate::models::Entity>,
}

mod defaults {
    use super::NameOverride;

    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
            .into()
    }
    pub fn accept() -> String {
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".into()
    }
    pub fn accept_language() -> String {
        "en-US,en;q=0.9".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Sync defaults
    pub fn stale_after() -> u64 {
        900
    }
    pub fn db_path() -> String {
        "data/medals.db".into()
    }

    // Known historical naming exceptions between the source and IOC codes.
    pub fn overrides() -> Vec<NameOverride> {
        [
            ("united states", "USA"),
            ("great britain", "GBR"),
            ("south korea", "KOR"),
            ("czech republic", "CZE"),
            ("roc", "ROC"),
            ("chinese taipei", "TPE"),
            ("hong kong", "HKG"),
            ("new zealand", "NZL"),
            ("south africa", "RSA"),
        ]
        .iter()
        .map(|(name, code)| NameOverride {
            name: name.to_string(),
            code: code.to_string(),
        })
        .collect()
    }
}
