// src/models/entity.rs

//! Catalog entity record.

use serde::{Deserialize, Serialize};

/// A country/team/committee eligible for medals within a competition.
///
/// Catalog entries are created during setup and are read-only to this
/// subsystem; the pipeline only attaches medal data to existing entities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entity {
    /// Stable canonical code (e.g. IOC code "NOR")
    pub code: String,

    /// Display name (e.g. "Norway")
    pub name: String,
}
