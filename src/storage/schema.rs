// src/storage/schema.rs

//! SQL schema for the medal store.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA foreign_keys = ON;

-- Catalog of medal-eligible entities, one row per (competition, code).
-- Populated during catalog setup; the sync pipeline never writes here.
CREATE TABLE IF NOT EXISTS entities (
    competition_id TEXT NOT NULL,
    code           TEXT NOT NULL,
    name           TEXT NOT NULL,
    PRIMARY KEY (competition_id, code)
);

-- Latest medal snapshot. points is always gold*3 + silver*2 + bronze.
CREATE TABLE IF NOT EXISTS medals (
    competition_id TEXT NOT NULL,
    code           TEXT NOT NULL,
    gold           INTEGER NOT NULL DEFAULT 0,
    silver         INTEGER NOT NULL DEFAULT 0,
    bronze         INTEGER NOT NULL DEFAULT 0,
    points         INTEGER NOT NULL DEFAULT 0,
    updated_at     TEXT NOT NULL,
    PRIMARY KEY (competition_id, code),
    FOREIGN KEY (competition_id, code) REFERENCES entities (competition_id, code)
);

-- Namespaced key/value records: per-competition refresh lock and the
-- latest-attempt-only scrape journal (JSON value).
CREATE TABLE IF NOT EXISTS sync_meta (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS medals_updated_idx ON medals (competition_id, updated_at);
";
