// src/main.rs

//! medalsync CLI
//!
//! Operator entry point: seed the catalog, force or trigger refreshes,
//! inspect refresh state, and clear a wedged lock.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use medalsync::{
    config::{Catalog, Config},
    error::Result,
    pipeline::RefreshCoordinator,
    services::HttpFetcher,
    storage::MedalStore,
};

/// medalsync - medal-table synchronization
#[derive(Parser, Debug)]
#[command(
    name = "medalsync",
    version,
    about = "Keeps a local medal-table store synchronized with an external source"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Refresh a competition's medal data from its source
    Refresh {
        /// Competition identifier
        competition: String,

        /// Refresh even if the data is not yet stale
        #[arg(long)]
        force: bool,
    },

    /// Show refresh state and the last scrape summary
    Status {
        /// Competition identifier
        competition: String,
    },

    /// Load catalog entities from a TOML seed file
    Seed {
        /// Path to the catalog file
        catalog: PathBuf,
    },

    /// Validate the configuration file
    Validate,

    /// Clear a wedged refresh lock left by a crashed process
    Unlock {
        /// Competition identifier
        competition: String,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    config.validate()?;
    let config = Arc::new(config);

    match cli.command {
        Command::Refresh { competition, force } => {
            let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
            let coordinator = RefreshCoordinator::new(Arc::clone(&config), fetcher)?;

            if !force && !coordinator.is_stale(&competition)?.stale {
                log::info!("Data for {competition} is fresh; nothing to do (use --force)");
                return Ok(());
            }

            let summary = coordinator.run_refresh_now(&competition).await?;
            if summary.success {
                log::info!(
                    "Refreshed {competition}: {} rows fetched, {} merged, changed: {}",
                    summary.fetched_count,
                    summary.updated_count,
                    summary.changed
                );
                if !summary.unresolved.is_empty() {
                    log::warn!("Unresolved names: {}", summary.unresolved.join(", "));
                }
            } else {
                log::error!(
                    "Refresh failed for {competition}: {}",
                    summary.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        Command::Status { competition } => {
            let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
            let coordinator = RefreshCoordinator::new(Arc::clone(&config), fetcher)?;

            let staleness = coordinator.is_stale(&competition)?;
            let status = coordinator.refresh_status(&competition)?;

            println!("competition:  {competition}");
            println!("stale:        {}", staleness.stale);
            println!("in progress:  {}", status.in_progress);
            match status.last_updated {
                Some(ts) => println!("last updated: {ts}"),
                None => println!("last updated: never"),
            }

            match coordinator.last_scrape_summary(&competition)? {
                Some(summary) => {
                    println!(
                        "last scrape:  {} (success: {}, merged: {}, changed: {})",
                        summary.timestamp, summary.success, summary.updated_count, summary.changed
                    );
                    if !summary.unresolved.is_empty() {
                        println!("unresolved:   {}", summary.unresolved.join(", "));
                    }
                    if let Some(error) = summary.error {
                        println!("error:        {error}");
                    }
                }
                None => println!("last scrape:  never"),
            }
        }

        Command::Seed { catalog } => {
            let catalog = Catalog::load(&catalog)?;
            let mut store = MedalStore::open(&config.sync.db_path)?;
            for competition in &catalog.competitions {
                let count = store.seed_entities(&competition.id, &competition.entities)?;
                log::info!("Seeded {count} entities for {}", competition.id);
            }
        }

        Command::Validate => {
            log::info!(
                "Configuration OK: {} competition(s), {} override(s)",
                config.competitions.len(),
                config.overrides.len()
            );
        }

        Command::Unlock { competition } => {
            let fetcher = Arc::new(HttpFetcher::new(&config.fetcher)?);
            let coordinator = RefreshCoordinator::new(Arc::clone(&config), fetcher)?;
            coordinator.clear_refresh_lock(&competition)?;
            log::info!("Cleared refresh lock for {competition}");
        }
    }

    Ok(())
}
