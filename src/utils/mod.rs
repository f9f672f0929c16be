// src/utils/mod.rs

//! Shared utility modules.

pub mod time;

pub use time::parse_stored_timestamp;
