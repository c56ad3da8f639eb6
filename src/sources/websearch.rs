//! Web search source adapter (SearXNG JSON API).
//!
//! Last resort in the fallback chain: queries a SearXNG instance for
//! "<product> nutrition facts" and extracts what it can from the result
//! snippets. Everything it produces carries web-search authority, so a
//! structured source always wins a conflict against it.
//!
//! # Default Configuration
//!
//! - Base URL: `http://localhost:8080` (self-hosted SearXNG)
//!
//! # Environment Variables
//!
//! - `SEARXNG_BASE_URL`: override the search instance URL

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::{FetchError, Result};
use crate::normalize::{normalize, RawResponse, Snippet};
use crate::record::{PartialRecord, Query, SourceKind};
use crate::sources::Source;

/// Default SearXNG instance URL.
const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Search hits considered per query.
const MAX_RESULTS: usize = 5;

/// Unstructured web search over a SearXNG instance.
#[derive(Debug, Clone)]
pub struct WebSearchSource {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl WebSearchSource {
    /// Create a source against the default local instance.
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a source against a custom SearXNG instance.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("nutrifetch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a source from `SEARXNG_BASE_URL`, falling back to the local
    /// default.
    pub fn from_env() -> Result<Self> {
        match std::env::var("SEARXNG_BASE_URL") {
            Ok(url) if !url.is_empty() => Self::with_base_url(url),
            _ => Self::new(),
        }
    }

    async fn search(&self, terms: &str, timeout: Duration) -> Result<Vec<Snippet>> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("q", terms), ("format", "json")])
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Api(format!("HTTP {} from {}", status, url)));
        }

        let body = response.text().await?;
        let envelope: SearchEnvelope = serde_json::from_str(&body)?;
        Ok(envelope
            .results
            .into_iter()
            .take(MAX_RESULTS)
            .map(|hit| Snippet {
                title: hit.title,
                url: hit.url,
                content: hit.content,
            })
            .collect())
    }
}

#[async_trait]
impl Source for WebSearchSource {
    fn name(&self) -> &str {
        "websearch"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::WebSearch
    }

    async fn fetch(&self, query: &Query, timeout: Duration) -> Result<PartialRecord> {
        let terms = format!("{} nutrition facts", query.as_str());
        debug!(terms_len = terms.len(), "web search lookup");

        let snippets = self.search(&terms, timeout).await?;
        if snippets.is_empty() {
            return Err(FetchError::NotFound);
        }

        let retrieved_at = SystemTime::now();
        let record = normalize(
            RawResponse::Snippets(snippets),
            self.kind(),
            self.name(),
            retrieved_at,
        );
        if record.is_empty() {
            // Hits came back but none of them carried usable figures.
            return Err(FetchError::NotFound);
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_envelope_parsing() {
        let envelope: SearchEnvelope = serde_json::from_str(
            r#"{
                "query": "granola nutrition facts",
                "results": [
                    {"title": "Granola - Nutritionix", "url": "https://example.com", "content": "490 kcal per 100g"},
                    {"title": "Granola facts", "url": "https://example.org"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(envelope.results.len(), 2);
        assert_eq!(envelope.results[0].content, "490 kcal per 100g");
        // Missing fields default to empty rather than failing the parse.
        assert_eq!(envelope.results[1].content, "");
    }

    #[test]
    fn test_empty_results_parse() {
        let envelope: SearchEnvelope = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert!(envelope.results.is_empty());
    }
}
