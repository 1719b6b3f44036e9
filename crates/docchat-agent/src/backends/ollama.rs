use super::{http_client, map_request_error};
use crate::completion::CompletionService;
use crate::config::{BackendConfig, SessionConfig};
use crate::prompt::Prompt;
use async_trait::async_trait;
use docchat_core::{DocchatError, DocchatResult};
use serde::{Deserialize, Serialize};

/// Text completion against a local Ollama server (`POST /api/generate`).
pub struct OllamaBackend {
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaBackend {
    /// Bind `session` to the server described by `backend`.
    pub fn new(backend: &BackendConfig, session: &SessionConfig) -> DocchatResult<Self> {
        Ok(Self {
            base_url: backend.base_url().to_string(),
            model: session.model.clone(),
            temperature: session.temperature,
            max_tokens: backend.max_tokens,
            timeout_secs: backend.timeout_secs,
            http: http_client(backend.timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionService for OllamaBackend {
    async fn complete(&self, prompt: &Prompt) -> DocchatResult<String> {
        let rendered = prompt.render();
        let body = GenerateRequest {
            model: &self.model,
            prompt: &rendered,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let resp = self
            .http
            .post(format!("{}/api/generate", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_request_error(e, "Ollama", self.timeout_secs))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            if status.as_u16() == 404 {
                return Err(DocchatError::Completion(format!(
                    "Model '{}' not found. Pull it with: ollama pull {}",
                    self.model, self.model
                )));
            }
            return Err(DocchatError::Completion(format!(
                "Ollama error ({status}): {text}"
            )));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| map_request_error(e, "Ollama", self.timeout_secs))?;
        Ok(parsed.response.trim().to_string())
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }
}
