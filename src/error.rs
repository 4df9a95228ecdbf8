//! Error types for the research pipeline.
//!
//! Only configuration errors are fatal. Search and generation errors are
//! surfaced by the providers and absorbed at the planner, distiller,
//! composer and orchestrator boundaries, where they degrade a branch to an
//! empty contribution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`SearchProvider`](crate::search::SearchProvider).
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Rate limited by search provider")]
    RateLimited,

    #[error("Search request timed out")]
    Timeout,

    #[error("Unauthorized - check the search API key")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("HTTP error ({0}): {1}")]
    Http(u16, String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse search response: {0}")]
    Parse(String),
}

impl SearchError {
    /// Rate limiting is the only condition the orchestrator retries.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SearchError::RateLimited)
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SearchError::Timeout
        } else if e.is_decode() {
            SearchError::Parse(e.to_string())
        } else {
            SearchError::Network(e.to_string())
        }
    }
}

/// Errors raised by a [`TextGenerator`](crate::llm::TextGenerator).
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Text generation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{provider} completion failed: {message}")]
    Provider { provider: String, message: String },

    #[error("Provider returned an empty response")]
    EmptyResponse,
}

/// Startup errors from credential loading and backend selection.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is not set (provide the key itself or a path to a file containing it)")]
    MissingCredential(&'static str),

    #[error("Unknown text generation provider: {0}")]
    UnknownProvider(String),

    #[error("Failed to read key file {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
