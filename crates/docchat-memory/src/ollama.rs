use crate::embedding::EmbeddingProvider;
use async_trait::async_trait;
use docchat_core::{DocchatError, DocchatResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Embeddings served by an Ollama instance (`POST /api/embed`).
pub struct OllamaEmbedding {
    endpoint: String,
    model: String,
    dimension: usize,
    timeout_secs: u64,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    truncate: bool,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedding {
    /// Create a client for `model` at `endpoint` (e.g. `http://localhost:11434`).
    pub fn new(
        endpoint: &str,
        model: &str,
        dimension: usize,
        timeout_secs: u64,
    ) -> DocchatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DocchatError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
            timeout_secs,
            client,
        })
    }

    fn map_request_error(&self, e: reqwest::Error) -> DocchatError {
        if e.is_timeout() {
            DocchatError::Timeout {
                operation: "embedding".to_string(),
                seconds: self.timeout_secs,
            }
        } else if e.is_connect() {
            DocchatError::Embedding(format!(
                "Cannot connect to Ollama at {}. Is Ollama running? (ollama serve)",
                self.endpoint
            ))
        } else {
            DocchatError::Embedding(format!("Ollama request failed: {e}"))
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> DocchatResult<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DocchatError::Embedding("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> DocchatResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(DocchatError::Embedding(
                "Cannot embed empty text".to_string(),
            ));
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
            truncate: true,
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 404 || body.contains("not found") {
                return Err(DocchatError::Embedding(format!(
                    "Model '{}' not found. Pull it with: ollama pull {}",
                    self.model, self.model
                )));
            }

            return Err(DocchatError::Embedding(format!(
                "Ollama error ({status}): {body}"
            )));
        }

        let embed_response: EmbedResponse = response
            .json()
            .await
            .map_err(|e| self.map_request_error(e))?;

        if embed_response.embeddings.len() != texts.len() {
            return Err(DocchatError::Embedding(format!(
                "Requested {} embeddings, received {}",
                texts.len(),
                embed_response.embeddings.len()
            )));
        }
        if let Some(bad) = embed_response
            .embeddings
            .iter()
            .find(|v| v.len() != self.dimension)
        {
            return Err(DocchatError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.len(),
            });
        }

        Ok(embed_response.embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
