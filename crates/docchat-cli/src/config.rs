use anyhow::Context;
use docchat_agent::{
    BackendConfig, BackendFactory, LlmProvider, ModelCatalog, RetrievalConfig, SessionConfig,
    TimeoutConfig,
};
use docchat_memory::{
    Chunker, ChunkerConfig, EmbeddingProvider, LoaderConfig, LoaderRegistry, LocalEmbedding,
    OllamaEmbedding, Similarity,
};
use docchat_session::{IngestPipeline, SessionManager, SessionOptions};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "docchat.toml";

/// Environment variable that fills an empty `backend.api_key`.
pub const API_KEY_ENV: &str = "DOCCHAT_API_KEY";

/// Everything in `docchat.toml`. Every section is optional.
#[derive(Debug, Default, Deserialize)]
pub struct DocchatConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    /// Defaults for new sessions (model, temperature, system prompt).
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chunker: ChunkerConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub models: ModelCatalog,
    #[serde(default)]
    pub loaders: LoaderConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Hashed bag-of-words, no server needed.
    #[default]
    Local,
    Ollama,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub provider: EmbeddingBackend,
    #[serde(default = "default_embedding_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Vector length; defaults to 256 for local and 768 for Ollama.
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default)]
    pub similarity: Similarity,
}

fn default_embedding_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingBackend::default(),
            endpoint: default_embedding_endpoint(),
            model: default_embedding_model(),
            dimension: None,
            similarity: Similarity::default(),
        }
    }
}

impl DocchatConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: DocchatConfig = toml::from_str(text)?;
        Ok(config)
    }

    /// Read the config named on the command line, or `docchat.toml` when it
    /// exists, or fall back to defaults.
    pub async fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !tokio::fs::try_exists(&default).await.unwrap_or(false) {
                    info!("No {DEFAULT_CONFIG_FILE} found, using defaults");
                    return Ok(Self::default().with_env_key(std::env::var(API_KEY_ENV).ok()));
                }
                default
            }
        };

        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("Invalid config file '{}'", path.display()))?;
        info!(path = %path.display(), "Config loaded");
        Ok(config.with_env_key(std::env::var(API_KEY_ENV).ok()))
    }

    /// Fill an empty API key from the environment.
    pub fn with_env_key(mut self, key: Option<String>) -> Self {
        if self.backend.api_key.is_empty() {
            if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
                self.backend.api_key = key;
            }
        }
        self
    }

    /// Check what can be checked before any network call.
    pub fn validate(&self) -> anyhow::Result<()> {
        Chunker::new(self.chunker.clone())?;
        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be at least 1");
        }
        if self.models.models().is_empty() {
            anyhow::bail!("models must list at least one model");
        }
        if self.backend.provider == LlmProvider::OpenAi && self.backend.api_key.is_empty() {
            anyhow::bail!("backend.api_key (or {API_KEY_ENV}) is required for the openai provider");
        }
        self.session.validate(&self.models)?;
        Ok(())
    }

    fn embedder(&self) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
        let embedder: Arc<dyn EmbeddingProvider> = match self.embedding.provider {
            EmbeddingBackend::Local => {
                Arc::new(LocalEmbedding::new(self.embedding.dimension.unwrap_or(256)))
            }
            EmbeddingBackend::Ollama => Arc::new(OllamaEmbedding::new(
                &self.embedding.endpoint,
                &self.embedding.model,
                self.embedding.dimension.unwrap_or(768),
                self.timeouts.embedding_secs,
            )?),
        };
        Ok(embedder)
    }

    /// Assemble a session manager from this config.
    pub fn build_manager(&self) -> anyhow::Result<SessionManager> {
        self.validate()?;
        let pipeline = IngestPipeline::new(
            Chunker::new(self.chunker.clone())?,
            self.embedder()?,
            self.embedding.similarity,
            self.timeouts.embedding_secs,
        );
        let factory = Arc::new(BackendFactory::new(self.backend.clone()));
        let options = SessionOptions {
            catalog: self.models.clone(),
            retrieval: self.retrieval.clone(),
            timeouts: self.timeouts,
        };
        info!(
            provider = ?self.backend.provider,
            embedding = ?self.embedding.provider,
            chunk_size = self.chunker.chunk_size,
            top_k = self.retrieval.top_k,
            "Session manager ready"
        );
        Ok(SessionManager::new(pipeline, factory, options)
            .with_loaders(LoaderRegistry::from_config(&self.loaders)))
    }
}
