// src/services/resolver.rs

//! Entity resolution: free-text source names to canonical catalog codes.

use std::collections::HashMap;

use crate::config::NameOverride;
use crate::models::Entity;

/// Resolves display names against one competition's catalog.
///
/// Resolution order, first match wins:
/// 1. exact lookup in the manual override table,
/// 2. case-insensitive exact match on catalog display names,
/// 3. case-insensitive prefix match on the first word of the name
///    ("United States" matches "United States of America").
///
/// Unresolved names are reported as `None`, never as errors; the caller
/// accumulates them for the scrape journal.
pub struct EntityResolver {
    overrides: HashMap<String, String>,
    by_name: HashMap<String, String>,
    /// (lowercased display name, code), catalog order preserved
    catalog: Vec<(String, String)>,
}

impl EntityResolver {
    /// Build a resolver from the override table and the catalog.
    pub fn new(overrides: &[NameOverride], entities: &[Entity]) -> Self {
        let overrides = overrides
            .iter()
            .map(|o| (normalize(&o.name), o.code.clone()))
            .collect();

        let catalog: Vec<(String, String)> = entities
            .iter()
            .map(|e| (normalize(&e.name), e.code.clone()))
            .collect();

        let by_name = catalog.iter().cloned().collect();

        Self {
            overrides,
            by_name,
            catalog,
        }
    }

    /// Resolve one display name to a canonical code.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let normalized = normalize(name);

        if let Some(code) = self.overrides.get(&normalized) {
            log::debug!("Resolved '{name}' to '{code}' via override");
            return Some(code);
        }

        if let Some(code) = self.by_name.get(&normalized) {
            log::debug!("Resolved '{name}' to '{code}' via exact match");
            return Some(code);
        }

        let first_word = normalized.split_whitespace().next()?;
        if let Some((_, code)) = self
            .catalog
            .iter()
            .find(|(catalog_name, _)| catalog_name.starts_with(first_word))
        {
            log::debug!("Resolved '{name}' to '{code}' via prefix match");
            return Some(code);
        }

        log::warn!("Could not resolve entity name '{name}' to a catalog code");
        None
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}
