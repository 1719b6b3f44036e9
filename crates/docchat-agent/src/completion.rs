use crate::backends::ollama::OllamaBackend;
use crate::backends::openai::OpenAiBackend;
use crate::config::{BackendConfig, LlmProvider, SessionConfig};
use crate::prompt::Prompt;
use async_trait::async_trait;
use docchat_core::DocchatResult;
use tracing::debug;

/// A language model bound to one [`SessionConfig`].
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `CompletionService` for your struct
/// 3. Add the variant to `LlmProvider` in `config.rs`
/// 4. Wire it up in [`BackendFactory::connect`]
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Produce the answer text for `prompt`.
    async fn complete(&self, prompt: &Prompt) -> DocchatResult<String>;

    /// Model this service was bound with.
    fn model(&self) -> &str;

    /// Temperature this service was bound with.
    fn temperature(&self) -> f32;
}

/// Creates completion services from session configs.
///
/// Sessions call this whenever their config changes, so implementations
/// should be cheap and must not share mutable state between the services
/// they return.
pub trait CompletionFactory: Send + Sync {
    /// Bind a fresh service to `config`.
    fn connect(&self, config: &SessionConfig) -> DocchatResult<Box<dyn CompletionService>>;
}

/// Factory that dispatches to the backend named in [`BackendConfig`].
#[derive(Debug, Clone, Default)]
pub struct BackendFactory {
    backend: BackendConfig,
}

impl BackendFactory {
    /// Create a factory for the given backend settings.
    pub fn new(backend: BackendConfig) -> Self {
        Self { backend }
    }

    /// Backend settings used for every connection.
    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }
}

impl CompletionFactory for BackendFactory {
    fn connect(&self, config: &SessionConfig) -> DocchatResult<Box<dyn CompletionService>> {
        debug!(
            provider = ?self.backend.provider,
            model = %config.model,
            temperature = config.temperature,
            "Binding completion service"
        );
        let service: Box<dyn CompletionService> = match self.backend.provider {
            LlmProvider::Ollama => Box::new(OllamaBackend::new(&self.backend, config)?),
            LlmProvider::OpenAi => Box::new(OpenAiBackend::new(&self.backend, config)?),
        };
        Ok(service)
    }
}
