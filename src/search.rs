//! # Search Module
//!
//! The web search capability used by the orchestrator:
//! - [`SearchProvider`]: one async `search(query, options)` method
//! - [`FirecrawlSearch`]: Firecrawl's search + scrape API over reqwest
//!
//! Rate limiting (HTTP 429) is reported as [`SearchError::RateLimited`] so
//! the caller can retry; every other failure is final for that call.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::SearchError;

pub const FIRECRAWL_DEFAULT_BASE_URL: &str = "https://api.firecrawl.dev";

// =============================================================================
// SEARCH TYPES
// =============================================================================
/// A single search hit with its scraped content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub url: String,

    /// Page content as markdown; empty when the page could not be scraped
    #[serde(default)]
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl SearchDocument {
    pub fn new(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content: content.into(),
            title: None,
        }
    }
}

/// Per-call search settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub timeout: Duration,
    pub limit: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            limit: 5,
        }
    }
}

/// Turns a query string into documents.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchDocument>, SearchError>;

    fn name(&self) -> &str;
}

// =============================================================================
// FIRECRAWL
// =============================================================================
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FirecrawlRequest<'a> {
    query: &'a str,
    limit: usize,
    /// milliseconds
    timeout: u64,
    scrape_options: ScrapeOptions,
}

#[derive(Debug, Serialize)]
struct ScrapeOptions {
    formats: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
struct FirecrawlResponse {
    #[serde(default)]
    data: Vec<FirecrawlResult>,
}

#[derive(Debug, Deserialize)]
struct FirecrawlResult {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    markdown: Option<String>,
}

impl FirecrawlResult {
    /// Hits without a URL are dropped. Scraped markdown is preferred over
    /// the search snippet.
    fn into_document(self) -> Option<SearchDocument> {
        let url = self.url.filter(|u| !u.is_empty())?;
        let content = self
            .markdown
            .filter(|m| !m.trim().is_empty())
            .or(self.description)
            .unwrap_or_default();
        Some(SearchDocument {
            url,
            content,
            title: self.title.filter(|t| !t.is_empty()),
        })
    }
}

/// Firecrawl search client.
///
/// ```ignore
/// let search = FirecrawlSearch::new("fc-...");
/// let docs = search.search("rust async runtimes", &SearchOptions::default()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct FirecrawlSearch {
    api_key: String,
    base_url: String,
    client: Client,
}

impl FirecrawlSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: FIRECRAWL_DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Point at a self-hosted instance (or a mock server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SearchProvider for FirecrawlSearch {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchDocument>, SearchError> {
        info!(query = %query, limit = options.limit, "Performing web search");

        let request = FirecrawlRequest {
            query,
            limit: options.limit,
            timeout: options.timeout.as_millis() as u64,
            scrape_options: ScrapeOptions {
                formats: vec!["markdown"],
            },
        };

        let url = format!("{}/v1/search", self.base_url);
        debug!(url = %url, "Sending search request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => SearchError::RateLimited,
                401 | 403 => SearchError::Unauthorized,
                400 => SearchError::BadRequest(body),
                code @ 500..=599 => SearchError::ServerError(code, body),
                code => SearchError::Http(code, body),
            });
        }

        let parsed: FirecrawlResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        let documents: Vec<SearchDocument> = parsed
            .data
            .into_iter()
            .filter_map(FirecrawlResult::into_document)
            .take(options.limit)
            .collect();

        if documents.is_empty() {
            warn!(query = %query, "No search results found");
        } else {
            info!(query = %query, count = documents.len(), "Search completed");
        }

        Ok(documents)
    }

    fn name(&self) -> &str {
        "firecrawl"
    }
}
