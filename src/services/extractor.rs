// src/services/extractor.rs

//! Medal-table extraction from the source HTML document.
//!
//! The source table is structurally irregular: rows with tied ranks omit
//! the rank cell via a rowspan, shifting every later column. Each row is
//! classified once as [`RowShape::WithRank`] or [`RowShape::WithoutRank`]
//! and column offsets follow from that.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{MedalRow, RowShape};

/// Extract all medal rows from the primary results table.
///
/// Fails only when no results table is present at all. Individual rows
/// that cannot be parsed are logged and skipped so one malformed row
/// never aborts the rest of the document.
pub fn extract_medal_table(html: &str) -> Result<Vec<MedalRow>> {
    let document = Html::parse_document(html);

    let table_sel = parse_selector("table.wikitable")?;
    let row_sel = parse_selector("tr")?;
    let cell_sel = parse_selector("th, td")?;
    let link_sel = parse_selector("a")?;

    let table = document
        .select(&table_sel)
        .next()
        .ok_or_else(|| AppError::extraction("No results table (table.wikitable) found"))?;

    let mut rows = Vec::new();

    // First row is the column header.
    for row in table.select(&row_sel).skip(1) {
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();

        let Some(shape) = RowShape::from_cell_count(cells.len()) else {
            continue;
        };

        let name_cell = cells[shape.name_index()];

        // Data rows mark the entity cell as <th scope="row">; anything
        // else (sub-headers, spanning cells) is not a medal line.
        if name_cell.value().name() != "th" || name_cell.value().attr("scope") != Some("row") {
            continue;
        }

        let name = clean_entity_name(&cell_text(name_cell, &link_sel));
        if name.is_empty() || is_summary_row(&name) {
            continue;
        }

        let (gold_idx, silver_idx, bronze_idx) = shape.medal_indices();
        let counts = (
            parse_count(cells[gold_idx]),
            parse_count(cells[silver_idx]),
            parse_count(cells[bronze_idx]),
        );

        let (Some(gold), Some(silver), Some(bronze)) = counts else {
            log::warn!("Could not parse medal counts for '{name}', skipping row");
            continue;
        };

        let row = MedalRow {
            name,
            gold,
            silver,
            bronze,
        };

        if row.has_medals() {
            rows.push(row);
        }
    }

    log::debug!("Extracted {} medal rows", rows.len());
    Ok(rows)
}

/// Prefer the entity link's text; fall back to the whole cell.
fn cell_text(cell: ElementRef, link_sel: &Selector) -> String {
    match cell.select(link_sel).next() {
        Some(link) => link.text().collect(),
        None => cell.text().collect(),
    }
}

/// Strip decorative marks: host-country asterisk, daggers, footnote refs.
fn clean_entity_name(raw: &str) -> String {
    static MARKS: OnceLock<Regex> = OnceLock::new();
    let marks = MARKS.get_or_init(|| Regex::new(r"[*†‡]|\[[^\]]*\]").unwrap());

    let stripped = marks.replace_all(raw, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Totals and per-event-count footers are not medal lines.
fn is_summary_row(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "total" || lower == "totals" || lower.contains("entries")
}

/// Parse one medal-count cell; empty counts as zero.
fn parse_count(cell: ElementRef) -> Option<u32> {
    let text: String = cell.text().collect();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0);
    }
    trimmed.parse().ok()
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::extraction(format!("Invalid selector '{s}': {e:?}")))
}
