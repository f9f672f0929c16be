// src/lib.rs

//! Medal-table synchronization library.
//!
//! Keeps a local SQLite medal store synchronized with an external HTML
//! medal table: scrape, entity-resolve, merge, detect staleness, and
//! coordinate single-flight background refreshes.

pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
