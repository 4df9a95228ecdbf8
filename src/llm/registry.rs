//! Construct-by-name mapping for text generation backends.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{RigGenerator, TextGenerator};
use crate::error::ConfigError;

/// Credentials and overrides handed to a backend constructor.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

pub type GeneratorConstructor =
    fn(&ProviderSettings) -> Result<Arc<dyn TextGenerator>, ConfigError>;

/// Explicit name → constructor map, filled in at startup.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    constructors: BTreeMap<String, GeneratorConstructor>,
}

impl GeneratorRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in Rig backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("openai", build_openai);
        registry.register("deepseek", build_deepseek);
        registry.register("gemini", build_gemini);
        registry.register("ollama", build_ollama);
        registry
    }

    /// Add or replace a backend.
    pub fn register(&mut self, name: impl Into<String>, constructor: GeneratorConstructor) {
        self.constructors.insert(name.into(), constructor);
    }

    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn create(
        &self,
        name: &str,
        settings: &ProviderSettings,
    ) -> Result<Arc<dyn TextGenerator>, ConfigError> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProvider(name.to_string()))?;
        constructor(settings)
    }
}

fn require_key(
    settings: &ProviderSettings,
    var: &'static str,
) -> Result<String, ConfigError> {
    settings
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or(ConfigError::MissingCredential(var))
}

fn build_openai(settings: &ProviderSettings) -> Result<Arc<dyn TextGenerator>, ConfigError> {
    let key = require_key(settings, "OPENAI_API_KEY")?;
    Ok(Arc::new(RigGenerator::openai(key, settings.model.clone())))
}

fn build_deepseek(settings: &ProviderSettings) -> Result<Arc<dyn TextGenerator>, ConfigError> {
    let key = require_key(settings, "DEEPSEEK_API_KEY")?;
    Ok(Arc::new(RigGenerator::deepseek(key, settings.model.clone())))
}

fn build_gemini(settings: &ProviderSettings) -> Result<Arc<dyn TextGenerator>, ConfigError> {
    let key = require_key(settings, "GEMINI_API_KEY")?;
    Ok(Arc::new(RigGenerator::gemini(key, settings.model.clone())))
}

fn build_ollama(settings: &ProviderSettings) -> Result<Arc<dyn TextGenerator>, ConfigError> {
    let host = settings
        .base_url
        .clone()
        .unwrap_or_else(|| "http://localhost:11434".to_string());
    Ok(Arc::new(RigGenerator::ollama(&host, settings.model.clone())))
}
