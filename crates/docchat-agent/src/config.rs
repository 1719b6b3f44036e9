use docchat_core::{DocchatError, DocchatResult};
use serde::{Deserialize, Serialize};

/// Per-session choices made by the user: model, creativity and system prompt.
///
/// A snapshot: changing any field means binding a new completion service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Model identifier, one of the [`ModelCatalog`] entries.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature in `[0.0, 1.0]`.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Instructions placed ahead of every assembled prompt.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_model() -> String {
    "gemma".to_string()
}

fn default_temperature() -> f32 {
    0.5
}

fn default_system_prompt() -> String {
    "You are a helpful AI. Answer based on the uploaded document.".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
        }
    }
}

impl SessionConfig {
    /// Create a config from its three fields.
    pub fn new(model: impl Into<String>, temperature: f32, system_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature,
            system_prompt: system_prompt.into(),
        }
    }

    /// Copy with a different model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Copy with a different temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Copy with a different system prompt.
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Check the temperature range and that the model is offered.
    pub fn validate(&self, catalog: &ModelCatalog) -> DocchatResult<()> {
        if !self.temperature.is_finite() || !(0.0..=1.0).contains(&self.temperature) {
            return Err(DocchatError::Config(format!(
                "temperature must be within [0.0, 1.0], got {}",
                self.temperature
            )));
        }
        if !catalog.contains(&self.model) {
            return Err(DocchatError::Config(format!(
                "unsupported model '{}' (available: {})",
                self.model,
                catalog.models().join(", ")
            )));
        }
        Ok(())
    }
}

/// The models a user may pick from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelCatalog {
    models: Vec<String>,
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::new(["gemma", "llama2", "phi3"])
    }
}

impl ModelCatalog {
    /// Build a catalogue from model identifiers, dropping duplicates.
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for model in models {
            let model = model.into();
            if !unique.contains(&model) {
                unique.push(model);
            }
        }
        Self { models: unique }
    }

    /// Whether `model` is offered.
    pub fn contains(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    /// All offered models, in display order.
    pub fn models(&self) -> &[String] {
        &self.models
    }
}

/// Which API the completion back end speaks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// A local Ollama server (`/api/generate`).
    #[default]
    Ollama,
    /// Any OpenAI-compatible chat completions API.
    OpenAi,
}

/// Where and how to reach the completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// API flavour.
    #[serde(default)]
    pub provider: LlmProvider,
    /// Overrides the provider's default base URL.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Bearer token for OpenAI-compatible APIs.
    #[serde(default)]
    pub api_key: String,
    /// Upper bound on generated tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// HTTP client timeout for one completion request.
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            api_base_url: None,
            api_key: String::new(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl BackendConfig {
    /// Base URL of the API, without a trailing slash.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                LlmProvider::Ollama => "http://localhost:11434",
                LlmProvider::OpenAi => "https://api.openai.com",
            }
        }
    }
}

/// Retrieval and prompt-assembly knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks placed in the prompt.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Only the most recent turns are rendered when set.
    #[serde(default)]
    pub max_history_turns: Option<usize>,
    /// Rephrase follow-up questions into standalone ones before retrieval.
    #[serde(default)]
    pub condense_question: bool,
}

fn default_top_k() -> usize {
    4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_history_turns: None,
            condense_question: false,
        }
    }
}

/// Deadlines for the two slow external calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Embedding a whole document or a question.
    #[serde(default = "default_embedding_secs")]
    pub embedding_secs: u64,
    /// One completion call.
    #[serde(default = "default_completion_secs")]
    pub completion_secs: u64,
}

fn default_embedding_secs() -> u64 {
    60
}

fn default_completion_secs() -> u64 {
    120
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            embedding_secs: default_embedding_secs(),
            completion_secs: default_completion_secs(),
        }
    }
}
