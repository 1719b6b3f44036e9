use super::{http_client, map_request_error};
use crate::completion::CompletionService;
use crate::config::{BackendConfig, SessionConfig};
use crate::prompt::Prompt;
use async_trait::async_trait;
use docchat_core::{DocchatError, DocchatResult, Role};

/// OpenAI-compatible chat completions backend.
///
/// Works with OpenAI, vLLM, LocalAI and any other server exposing
/// `/v1/chat/completions`.
pub struct OpenAiBackend {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Bind `session` to the API described by `backend`.
    pub fn new(backend: &BackendConfig, session: &SessionConfig) -> DocchatResult<Self> {
        Ok(Self {
            base_url: backend.base_url().to_string(),
            api_key: backend.api_key.clone(),
            model: session.model.clone(),
            temperature: session.temperature,
            max_tokens: backend.max_tokens,
            timeout_secs: backend.timeout_secs,
            http: http_client(backend.timeout_secs)?,
        })
    }

    fn build_messages(&self, prompt: &Prompt) -> Vec<serde_json::Value> {
        prompt
            .to_messages()
            .into_iter()
            .map(|m| {
                serde_json::json!({
                    "role": match m.role {
                        Role::System => "system",
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    },
                    "content": m.content
                })
            })
            .collect()
    }

    fn add_auth_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Content-Type", "application/json");
        if self.api_key.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Bearer {}", self.api_key))
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiBackend {
    async fn complete(&self, prompt: &Prompt) -> DocchatResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": self.build_messages(prompt),
        });

        let resp = self
            .add_auth_headers(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_request_error(e, "OpenAI", self.timeout_secs))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| map_request_error(e, "OpenAI", self.timeout_secs))?;

        if !status.is_success() {
            return Err(DocchatError::Completion(format!(
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        parse_openai_response(&resp_body)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }
}

/// Extract the answer text from a chat completions response body.
pub fn parse_openai_response(body: &serde_json::Value) -> DocchatResult<String> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| {
            DocchatError::Completion(format!("Response has no message content: {body}"))
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_openai_response() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": " 42 \n"}, "finish_reason": "stop"}]
        });
        assert_eq!(parse_openai_response(&body).unwrap(), "42");
    }

    #[test]
    fn test_parse_openai_response_missing_content() {
        let body = serde_json::json!({"choices": []});
        assert!(matches!(
            parse_openai_response(&body),
            Err(DocchatError::Completion(_))
        ));
    }
}
