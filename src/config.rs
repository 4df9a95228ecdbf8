//! # Configuration Module
//!
//! Loads settings from environment variables (and a `.env` file, if present).
//! Command-line flags in `main.rs` override what is loaded here.
//!
//! Credentials may be given either as the key itself or as a path to a file
//! holding the key, which keeps secrets out of shell history and process
//! listings.

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::llm::{GenerationOptions, ProviderSettings};
use crate::orchestrator::{ConcurrencyScope, ResearchConfig};
use crate::search::SearchOptions;

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Runtime configuration for a research run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Text generation backend name ("openai", "deepseek", "gemini", "ollama")
    pub provider: String,

    /// Model override; each backend has its own default
    pub model: Option<String>,

    pub openai_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub gemini_api_key: Option<String>,

    /// Ollama server URL (default: http://localhost:11434)
    pub ollama_host: String,

    pub firecrawl_key: Option<String>,

    /// Self-hosted Firecrawl endpoint
    pub firecrawl_base_url: Option<String>,

    pub temperature: Option<f64>,
    pub max_output_tokens: Option<u64>,

    /// Queries planned at the top level
    pub breadth: usize,

    /// Levels of recursion
    pub depth: usize,

    /// Research units allowed to run at once
    pub concurrency: usize,
    pub concurrency_scope: ConcurrencyScope,

    pub search_timeout: Duration,
    pub search_limit: usize,

    /// Where the final report is written
    pub report_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            openai_api_key: None,
            deepseek_api_key: None,
            gemini_api_key: None,
            ollama_host: "http://localhost:11434".to_string(),
            firecrawl_key: None,
            firecrawl_base_url: None,
            temperature: None,
            max_output_tokens: None,
            breadth: 4,
            depth: 2,
            // Firecrawl's free tier rate-limits hard; raise this on paid plans
            concurrency: 1,
            concurrency_scope: ConcurrencyScope::PerLevel,
            search_timeout: Duration::from_secs(15),
            search_limit: 5,
            report_path: PathBuf::from("output.md"),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Rust Concept: The ? Operator
    ///
    /// Each `?` below returns early with the parse error (plus the context
    /// string) if an environment variable is set but malformed.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (silently ignore if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key → value source.
    ///
    /// # Rust Concept: Closures as Parameters
    ///
    /// `impl Fn(&str) -> Option<String>` accepts `env::var` in production
    /// and a `HashMap` lookup in tests, with no trait object or allocation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(val) = get("LLM_PROVIDER") {
            config.provider = val.trim().to_ascii_lowercase();
        }
        config.model = get("LLM_MODEL");

        config.openai_api_key = get("OPENAI_API_KEY").map(|v| read_secret(&v)).transpose()?;
        config.deepseek_api_key = get("DEEPSEEK_API_KEY").map(|v| read_secret(&v)).transpose()?;
        config.gemini_api_key = get("GEMINI_API_KEY").map(|v| read_secret(&v)).transpose()?;
        config.firecrawl_key = get("FIRECRAWL_KEY").map(|v| read_secret(&v)).transpose()?;

        if let Some(val) = get("OLLAMA_API_BASE_URL") {
            config.ollama_host = val;
        }
        config.firecrawl_base_url = get("FIRECRAWL_BASE_URL");

        if let Some(val) = get("TEMPERATURE") {
            config.temperature = Some(
                val.parse()
                    .context("TEMPERATURE must be a valid floating-point number (e.g., 0.7)")?,
            );
        }

        if let Some(val) = get("MAX_OUTPUT_TOKENS") {
            config.max_output_tokens = Some(
                val.parse()
                    .context("MAX_OUTPUT_TOKENS must be a valid positive integer")?,
            );
        }

        if let Some(val) = get("RESEARCH_BREADTH") {
            config.breadth = val
                .parse()
                .context("RESEARCH_BREADTH must be a valid positive integer")?;
        }

        if let Some(val) = get("RESEARCH_DEPTH") {
            config.depth = val
                .parse()
                .context("RESEARCH_DEPTH must be a valid positive integer")?;
        }

        if let Some(val) = get("RESEARCH_CONCURRENCY") {
            config.concurrency = val
                .parse()
                .context("RESEARCH_CONCURRENCY must be a valid positive integer")?;
        }

        if let Some(val) = get("CONCURRENCY_SCOPE") {
            config.concurrency_scope = val
                .parse()
                .map_err(|e: String| anyhow::anyhow!("CONCURRENCY_SCOPE: {e}"))?;
        }

        if let Some(val) = get("SEARCH_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .context("SEARCH_TIMEOUT_SECS must be a whole number of seconds")?;
            config.search_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = get("SEARCH_LIMIT") {
            config.search_limit = val
                .parse()
                .context("SEARCH_LIMIT must be a valid positive integer")?;
        }

        if let Some(val) = get("REPORT_PATH") {
            config.report_path = PathBuf::from(val);
        }

        Ok(config)
    }

    /// Fail fast on values the orchestrator cannot work with.
    pub fn validate(&self) -> Result<()> {
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                anyhow::bail!("Temperature must be between 0.0 and 2.0, got: {}", temperature);
            }
        }

        if self.breadth == 0 {
            anyhow::bail!("Breadth must be at least 1");
        }

        if self.depth == 0 {
            anyhow::bail!("Depth must be at least 1");
        }

        if self.concurrency == 0 {
            anyhow::bail!("RESEARCH_CONCURRENCY must be at least 1");
        }

        if self.concurrency > tokio::sync::Semaphore::MAX_PERMITS {
            anyhow::bail!(
                "RESEARCH_CONCURRENCY must be at most {}",
                tokio::sync::Semaphore::MAX_PERMITS
            );
        }

        if self.search_limit == 0 {
            anyhow::bail!("SEARCH_LIMIT must be at least 1");
        }

        if self.search_timeout.is_zero() {
            anyhow::bail!("SEARCH_TIMEOUT_SECS must be at least 1");
        }

        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            anyhow::bail!("LLM_MODEL cannot be empty");
        }

        Ok(())
    }

    /// Credentials and overrides for the selected provider.
    pub fn provider_settings(&self) -> ProviderSettings {
        let api_key = match self.provider.as_str() {
            "openai" => self.openai_api_key.clone(),
            "deepseek" => self.deepseek_api_key.clone(),
            "gemini" => self.gemini_api_key.clone(),
            _ => None,
        };
        let base_url = (self.provider == "ollama").then(|| self.ollama_host.clone());

        ProviderSettings {
            api_key,
            base_url,
            model: self.model.clone(),
        }
    }

    pub fn require_firecrawl_key(&self) -> Result<&str, ConfigError> {
        self.firecrawl_key
            .as_deref()
            .ok_or(ConfigError::MissingCredential("FIRECRAWL_KEY"))
    }

    pub fn generation_options(&self) -> GenerationOptions {
        let mut options = GenerationOptions::default();
        if let Some(model) = &self.model {
            options = options.with_model(model.clone());
        }
        if let Some(temperature) = self.temperature {
            options = options.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_output_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        options
    }

    pub fn research_config(&self) -> ResearchConfig {
        ResearchConfig::default()
            .with_concurrency_limit(self.concurrency)
            .with_concurrency_scope(self.concurrency_scope)
            .with_search_options(SearchOptions {
                timeout: self.search_timeout,
                limit: self.search_limit,
            })
    }
}

/// A credential value is either the secret itself or a path to a file that
/// holds it. Existing files win; their contents are trimmed.
pub fn read_secret(value: &str) -> Result<String, ConfigError> {
    let path = Path::new(value.trim());
    if path.is_file() {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(contents.trim().to_string());
    }
    Ok(value.trim().to_string())
}
