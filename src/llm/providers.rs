//! Rig-backed text generators
//!
//! One [`RigGenerator`] wraps one Rig provider client. A fresh agent is built
//! per call so that model, temperature and token limits can vary by call.

use async_trait::async_trait;
use rig::client::{CompletionClient, ProviderClient};
use rig::completion::Prompt as _;
use rig::providers::{deepseek, gemini, ollama, openai};
use tracing::debug;

use super::{ChatMessage, GenerationOptions, Prompt, Role, TextGenerator};
use crate::error::GenerationError;

pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o";
pub const DEEPSEEK_DEFAULT_MODEL: &str = "deepseek-chat";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3.2";

enum Backend {
    /// Chat Completions API; the Responses API drops `response_format`.
    OpenAi(openai::CompletionsClient),
    DeepSeek(deepseek::Client),
    Gemini(gemini::Client),
    Ollama(ollama::Client),
}

/// A [`TextGenerator`] over a Rig provider client.
pub struct RigGenerator {
    name: &'static str,
    backend: Backend,
    default_model: String,
    /// Whether the backend accepts OpenAI's `response_format` parameter
    supports_json_mode: bool,
}

/// Extra request parameters asking for a JSON object response.
fn json_mode_params() -> serde_json::Value {
    serde_json::json!({ "response_format": { "type": "json_object" } })
}

impl RigGenerator {
    pub fn openai(api_key: impl Into<String>, model: Option<String>) -> Self {
        let api_key: String = api_key.into();
        Self {
            name: "openai",
            backend: Backend::OpenAi(openai::Client::from_val(api_key.into()).completions_api()),
            default_model: model.unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
            supports_json_mode: true,
        }
    }

    pub fn deepseek(api_key: impl Into<String>, model: Option<String>) -> Self {
        let api_key: String = api_key.into();
        Self {
            name: "deepseek",
            backend: Backend::DeepSeek(deepseek::Client::from_val(api_key.into())),
            default_model: model.unwrap_or_else(|| DEEPSEEK_DEFAULT_MODEL.to_string()),
            supports_json_mode: true,
        }
    }

    pub fn gemini(api_key: impl Into<String>, model: Option<String>) -> Self {
        let api_key: String = api_key.into();
        Self {
            name: "gemini",
            backend: Backend::Gemini(gemini::Client::from_val(api_key.into())),
            default_model: model.unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
            supports_json_mode: false,
        }
    }

    /// Local Ollama server. Rig reads the host from `OLLAMA_API_BASE_URL`.
    pub fn ollama(host: &str, model: Option<String>) -> Self {
        std::env::set_var("OLLAMA_API_BASE_URL", host);
        Self {
            name: "ollama",
            backend: Backend::Ollama(ollama::Client::from_env()),
            default_model: model.unwrap_or_else(|| OLLAMA_DEFAULT_MODEL.to_string()),
            supports_json_mode: false,
        }
    }
}

impl RigGenerator {
    /// Parameters merged into the provider request for this call.
    fn additional_params(&self, options: &GenerationOptions) -> Option<serde_json::Value> {
        (options.json_mode && self.supports_json_mode).then(json_mode_params)
    }
}

/// Split a transcript into a Rig preamble and a single prompt string.
///
/// System messages are joined into the preamble. If nothing else remains,
/// the system text itself is the prompt. A lone trailing user turn is sent
/// as-is; longer transcripts are rendered as `role: content` lines.
pub fn split_prompt(messages: Vec<ChatMessage>) -> (Option<String>, String) {
    let (system, rest): (Vec<_>, Vec<_>) = messages
        .into_iter()
        .partition(|m| m.role == Role::System);

    let system_text = system
        .into_iter()
        .map(|m| m.content)
        .collect::<Vec<_>>()
        .join("\n\n");

    match rest.as_slice() {
        [] => (None, system_text),
        [only] if only.role == Role::User => {
            let preamble = (!system_text.is_empty()).then_some(system_text);
            (preamble, only.content.clone())
        }
        _ => {
            let transcript = rest
                .iter()
                .map(|m| format!("{}: {}", m.role.as_str(), m.content))
                .collect::<Vec<_>>()
                .join("\n\n");
            let preamble = (!system_text.is_empty()).then_some(system_text);
            (preamble, transcript)
        }
    }
}

/// Build a one-shot agent on `$client` and run the prompt.
macro_rules! run_agent {
    ($client:expr, $model:expr, $preamble:expr, $prompt:expr, $options:expr, $params:expr) => {{
        let mut builder = $client.agent($model);
        if let Some(preamble) = $preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = $options.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(max_tokens) = $options.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(params) = $params {
            builder = builder.additional_params(params);
        }
        builder
            .build()
            .prompt($prompt)
            .await
            .map_err(|e| e.to_string())
    }};
}

#[async_trait]
impl TextGenerator for RigGenerator {
    async fn generate(
        &self,
        prompt: Prompt,
        options: &GenerationOptions,
    ) -> Result<String, GenerationError> {
        let model = options.model.as_deref().unwrap_or(&self.default_model);
        let (preamble, user_prompt) = split_prompt(prompt.into_messages());
        let preamble = preamble.as_deref();
        let params = self.additional_params(options);

        debug!(
            provider = self.name,
            model = %model,
            prompt_chars = user_prompt.len(),
            "Generating text"
        );

        let call = async {
            match &self.backend {
                Backend::OpenAi(client) => {
                    run_agent!(client, model, preamble, user_prompt.as_str(), options, params.clone())
                }
                Backend::DeepSeek(client) => {
                    run_agent!(client, model, preamble, user_prompt.as_str(), options, params.clone())
                }
                Backend::Gemini(client) => {
                    run_agent!(client, model, preamble, user_prompt.as_str(), options, params.clone())
                }
                Backend::Ollama(client) => {
                    run_agent!(client, model, preamble, user_prompt.as_str(), options, params.clone())
                }
            }
        };

        let text = tokio::time::timeout(options.timeout, call)
            .await
            .map_err(|_| GenerationError::Timeout(options.timeout))?
            .map_err(|message| GenerationError::Provider {
                provider: self.name.to_string(),
                message,
            })?;

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        self.name
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_system_and_user() {
        let (preamble, prompt) = split_prompt(vec![
            ChatMessage::system("You are terse."),
            ChatMessage::user("Summarise Rust."),
        ]);
        assert_eq!(preamble.as_deref(), Some("You are terse."));
        assert_eq!(prompt, "Summarise Rust.");
    }

    #[test]
    fn test_split_system_only_becomes_prompt() {
        let (preamble, prompt) = split_prompt(vec![ChatMessage::system("What is 2+2?")]);
        assert!(preamble.is_none());
        assert_eq!(prompt, "What is 2+2?");
    }

    #[test]
    fn test_split_transcript() {
        let (preamble, prompt) = split_prompt(vec![
            ChatMessage::system("sys"),
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
        ]);
        assert_eq!(preamble.as_deref(), Some("sys"));
        assert_eq!(prompt, "user: first\n\nassistant: reply\n\nuser: second");
    }

    #[test]
    fn test_openai_generator_defaults() {
        let generator = RigGenerator::openai("sk-test", None);
        assert_eq!(generator.name(), "openai");
        assert_eq!(generator.default_model(), OPENAI_DEFAULT_MODEL);

        let generator = RigGenerator::deepseek("sk-test", Some("deepseek-reasoner".into()));
        assert_eq!(generator.default_model(), "deepseek-reasoner");
    }

    #[test]
    fn test_json_mode_params_per_backend() {
        let json_on = GenerationOptions::default();
        let expected = serde_json::json!({ "response_format": { "type": "json_object" } });

        for generator in [
            RigGenerator::openai("sk-test", None),
            RigGenerator::deepseek("sk-test", None),
        ] {
            assert_eq!(generator.additional_params(&json_on), Some(expected.clone()));
            assert!(generator
                .additional_params(&GenerationOptions::default().with_json_mode(false))
                .is_none());
        }

        let gemini = RigGenerator::gemini("key", None);
        assert!(gemini.additional_params(&json_on).is_none());
    }
}
