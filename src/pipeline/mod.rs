// src/pipeline/mod.rs

//! Synchronization pipeline: staleness detection, the staged refresh run,
//! and the single-flight coordinator.

mod coordinator;
mod refresh;
mod staleness;

pub use coordinator::{RefreshCoordinator, RefreshStatus, TriggerOutcome};
pub use refresh::run_refresh;
pub use staleness::{Staleness, check_staleness};
