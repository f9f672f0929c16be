// src/models/mod.rs

//! Data structures shared across the synchronization pipeline.

mod entity;
mod journal;
mod medal;

pub use entity::Entity;
pub use journal::ScrapeSummary;
pub use medal::{MedalRecord, MedalRow, ResolvedRow, RowShape, points_for};
