//! Text generation capability
//!
//! Every model call in the pipeline goes through [`TextGenerator`], a single
//! async method over a prompt. Backends are Rig clients selected by name at
//! startup through [`GeneratorRegistry`].
//!
//! ```text
//!   planner / distiller / composer
//!                 │ generate(prompt, options)
//!                 ▼
//!        dyn TextGenerator
//!                 │
//!        ┌────────┼─────────┬─────────┐
//!        ▼        ▼         ▼         ▼
//!     openai  deepseek   gemini    ollama      (RigGenerator)
//! ```

mod providers;
mod registry;

pub use providers::{split_prompt, RigGenerator};
pub use registry::{GeneratorConstructor, GeneratorRegistry, ProviderSettings};

use async_trait::async_trait;
use std::time::Duration;

use crate::error::GenerationError;

/// Default per-call timeout for text generation.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(180);

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Input to a generator: a single system-style prompt or a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    Text(String),
    Chat(Vec<ChatMessage>),
}

impl Prompt {
    /// System instruction followed by one user turn.
    pub fn system_and_user(system: impl Into<String>, user: impl Into<String>) -> Self {
        Prompt::Chat(vec![ChatMessage::system(system), ChatMessage::user(user)])
    }

    /// Flatten to messages. A `Text` prompt becomes one system message.
    pub fn into_messages(self) -> Vec<ChatMessage> {
        match self {
            Prompt::Text(text) => vec![ChatMessage::system(text)],
            Prompt::Chat(messages) => messages,
        }
    }
}

impl From<&str> for Prompt {
    fn from(text: &str) -> Self {
        Prompt::Text(text.to_string())
    }
}

impl From<String> for Prompt {
    fn from(text: String) -> Self {
        Prompt::Text(text)
    }
}

/// Per-call generation settings. `None` fields fall back to the backend's
/// defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub model: Option<String>,
    pub max_tokens: Option<u64>,
    pub temperature: Option<f64>,
    pub timeout: Duration,
    /// Ask the backend for a JSON object response where it supports that.
    pub json_mode: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: None,
            temperature: None,
            timeout: DEFAULT_GENERATION_TIMEOUT,
            json_mode: true,
        }
    }
}

impl GenerationOptions {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }
}

/// Turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: Prompt,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError>;

    /// Provider name for logging
    fn name(&self) -> &str;

    /// Model used when the options do not name one
    fn default_model(&self) -> &str;
}
