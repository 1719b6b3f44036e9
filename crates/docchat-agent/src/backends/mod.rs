/// Ollama `/api/generate` backend.
pub mod ollama;
/// OpenAI-compatible chat completions backend.
pub mod openai;

use docchat_core::DocchatError;

/// Map a transport failure to the session error taxonomy.
///
/// Client-side deadline hits become retryable [`DocchatError::Timeout`]s;
/// everything else is a completion failure.
pub(crate) fn map_request_error(e: reqwest::Error, provider: &str, timeout_secs: u64) -> DocchatError {
    if e.is_timeout() {
        DocchatError::Timeout {
            operation: "completion".to_string(),
            seconds: timeout_secs,
        }
    } else if e.is_connect() {
        DocchatError::Completion(format!("Cannot connect to {provider}: {e}"))
    } else {
        DocchatError::Completion(format!("{provider} request failed: {e}"))
    }
}

/// Build the shared HTTP client with a request deadline.
pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client, DocchatError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocchatError::Config(format!("Failed to create HTTP client: {e}")))
}
