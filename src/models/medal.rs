// src/models/medal.rs

//! Medal row and record structures.

use serde::{Deserialize, Serialize};

/// Weighted points for a medal line: gold 3, silver 2, bronze 1.
///
/// Pool-scoring rule, not Olympic ranking convention.
pub fn points_for(gold: u32, silver: u32, bronze: u32) -> u32 {
    gold * 3 + silver * 2 + bronze
}

/// Shape of one source table row, decided once per row from its cell count.
///
/// The source omits the rank cell on tied ranks (a spanning cell covers
/// the tied group), which shifts every later column one position left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// Six cells: rank, name, gold, silver, bronze, total
    WithRank,
    /// Five cells: name, gold, silver, bronze, total
    WithoutRank,
}

impl RowShape {
    /// Classify a row by its cell count.
    ///
    /// Returns `None` for rows too short to be data rows.
    pub fn from_cell_count(count: usize) -> Option<Self> {
        match count {
            6 => Some(Self::WithRank),
            4..=5 => Some(Self::WithoutRank),
            _ => None,
        }
    }

    /// Index of the entity-name cell.
    pub fn name_index(self) -> usize {
        match self {
            Self::WithRank => 1,
            Self::WithoutRank => 0,
        }
    }

    /// Indices of the gold, silver, and bronze cells.
    pub fn medal_indices(self) -> (usize, usize, usize) {
        match self {
            Self::WithRank => (2, 3, 4),
            Self::WithoutRank => (1, 2, 3),
        }
    }
}

/// One raw row extracted from the source table, name not yet resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedalRow {
    /// Entity display name as it appears in the source
    pub name: String,

    pub gold: u32,
    pub silver: u32,
    pub bronze: u32,
}

impl MedalRow {
    /// Whether the row carries at least one medal.
    pub fn has_medals(&self) -> bool {
        self.gold > 0 || self.silver > 0 || self.bronze > 0
    }
}

/// A raw row whose name has been resolved to a canonical code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRow {
    /// Canonical entity code
    pub code: String,

    /// Source display name, kept for unmatched reporting
    pub name: String,

    pub gold: u32,
    pub silver: u32,
    pub bronze: u32,
}

impl ResolvedRow {
    /// Derived points value for this row.
    pub fn points(&self) -> u32 {
        points_for(self.gold, self.silver, self.bronze)
    }
}

/// A persisted medal record for one (competition, entity) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MedalRecord {
    pub code: String,
    pub gold: u32,
    pub silver: u32,
    pub bronze: u32,

    /// Always `points_for(gold, silver, bronze)`; recomputed on every write
    pub points: u32,

    /// Timestamp of the last write, as stored
    pub updated_at: String,
}
