// src/storage/mod.rs

//! Persistent SQLite store for catalog, medal records, lock, and journal.

mod schema;
mod store;

pub use store::{MedalStore, MergeOutcome};
