// src/services/fetcher.rs

//! External document fetcher.
//!
//! One outbound HTTP call per invocation, bounded by the configured
//! timeout. Retry policy belongs to the caller: a failed fetch simply
//! surfaces on the next staleness check.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};

use crate::config::FetcherConfig;
use crate::error::{AppError, Result};

/// Retrieves a raw document for a URL.
///
/// Trait seam so the refresh pipeline can run against fixture documents
/// in tests without touching the network.
#[async_trait]
pub trait FetchDocument: Send + Sync {
    /// Fetch the document body at `url`.
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Production fetcher backed by a shared `reqwest` client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher with browser-like identification headers.
    ///
    /// The source blocks default library user agents with 403 responses.
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, header_value(&config.accept)?);
        headers.insert(ACCEPT_LANGUAGE, header_value(&config.accept_language)?);

        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl FetchDocument for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        log::debug!("Fetching document: {url}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::fetch(url, e))?
            .error_for_status()
            .map_err(|e| AppError::fetch(url, e))?;

        response.text().await.map_err(|e| AppError::fetch(url, e))
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| AppError::config(format!("Invalid header value '{value}': {e}")))
}
