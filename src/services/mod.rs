// src/services/mod.rs

//! Scraping services: document fetch, table extraction, entity resolution.

pub mod extractor;
pub mod fetcher;
pub mod resolver;

pub use extractor::extract_medal_table;
pub use fetcher::{FetchDocument, HttpFetcher};
pub use resolver::EntityResolver;
