#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Regression tests for docchat-agent: configs, prompt assembly and both
//! HTTP back ends against a mock server.

use std::collections::HashMap;
use std::time::Duration;

use docchat_agent::{
    BackendConfig, BackendFactory, CompletionFactory, CompletionService, LlmProvider,
    ModelCatalog, Prompt, RetrievalConfig, SessionConfig, TimeoutConfig,
};
use docchat_core::{Chunk, ConversationTurn, DocchatError};
use docchat_memory::ScoredChunk;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chunk(content: &str) -> ScoredChunk {
    ScoredChunk {
        chunk: Chunk {
            document_id: Uuid::new_v4(),
            sequence: 0,
            segment: 0,
            start: 0,
            end: content.chars().count(),
            content: content.to_string(),
            metadata: HashMap::new(),
        },
        score: 1.0,
    }
}

fn factory(server: &MockServer, provider: LlmProvider, timeout_secs: u64) -> BackendFactory {
    BackendFactory::new(BackendConfig {
        provider,
        api_base_url: Some(server.uri()),
        api_key: "sk-test".to_string(),
        max_tokens: 256,
        timeout_secs,
    })
}

// --- Config ---

#[test]
fn test_config_deserialization_with_defaults() {
    let backend: BackendConfig = toml::from_str("provider = \"openai\"").unwrap();
    assert_eq!(backend.provider, LlmProvider::OpenAi);
    assert_eq!(backend.max_tokens, 1024);
    assert_eq!(backend.timeout_secs, 120);

    let session: SessionConfig = toml::from_str("model = \"llama2\"").unwrap();
    assert_eq!(session.model, "llama2");
    assert_eq!(session.temperature, 0.5);
    assert!(!session.system_prompt.is_empty());

    let retrieval: RetrievalConfig = toml::from_str("").unwrap();
    assert_eq!(retrieval.top_k, 4);
    assert!(!retrieval.condense_question);

    let timeouts: TimeoutConfig = toml::from_str("completion_secs = 5").unwrap();
    assert_eq!(timeouts.embedding_secs, 60);
    assert_eq!(timeouts.completion_secs, 5);
}

#[test]
fn test_catalog_from_toml_list() {
    #[derive(serde::Deserialize)]
    struct Wrapper {
        models: ModelCatalog,
    }
    let wrapper: Wrapper = toml::from_str("models = [\"mistral\", \"phi3\"]").unwrap();
    assert!(wrapper.models.contains("mistral"));
    assert!(!wrapper.models.contains("gemma"));
}

// --- Ollama backend ---

#[tokio::test]
async fn test_ollama_generate_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(serde_json::json!({
            "model": "llama2",
            "stream": false,
            "options": {"temperature": 0.25, "num_predict": 256}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"response": " X is 42.\n", "done": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let service = factory(&server, LlmProvider::Ollama, 5)
        .connect(&SessionConfig::default().with_model("llama2").with_temperature(0.25))
        .unwrap();
    let prompt = Prompt::answer("sys", &[], vec![chunk("X is 42.")], "What is X?");
    let answer = service.complete(&prompt).await.unwrap();
    assert_eq!(answer, "X is 42.");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let sent = body["prompt"].as_str().unwrap();
    assert!(sent.contains("X is 42."));
    assert!(sent.ends_with("Question: What is X?\nHelpful Answer:"));
}

#[tokio::test]
async fn test_ollama_missing_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(404).set_body_string("model not found"))
        .mount(&server)
        .await;

    let service = factory(&server, LlmProvider::Ollama, 5)
        .connect(&SessionConfig::default())
        .unwrap();
    let err = service
        .complete(&Prompt::answer("", &[], vec![], "q"))
        .await
        .unwrap_err();
    assert!(matches!(err, DocchatError::Completion(_)));
    assert!(err.to_string().contains("ollama pull gemma"));
}

#[tokio::test]
async fn test_ollama_slow_response_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(serde_json::json!({"response": "late"})),
        )
        .mount(&server)
        .await;

    let service = factory(&server, LlmProvider::Ollama, 1)
        .connect(&SessionConfig::default())
        .unwrap();
    let err = service
        .complete(&Prompt::answer("", &[], vec![], "q"))
        .await
        .unwrap_err();
    assert!(matches!(err, DocchatError::Timeout { seconds: 1, .. }));
    assert!(err.is_retryable());
}

// --- OpenAI-compatible backend ---

#[tokio::test]
async fn test_openai_chat_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(serde_json::json!({
            "model": "phi3",
            "max_tokens": 256
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Ada wrote it."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let service = factory(&server, LlmProvider::OpenAi, 5)
        .connect(&SessionConfig::default().with_model("phi3"))
        .unwrap();
    let history = vec![
        ConversationTurn::user("What is this?"),
        ConversationTurn::assistant("A biography."),
    ];
    let prompt = Prompt::answer(
        "Be brief.",
        &history,
        vec![chunk("Ada wrote it.")],
        "Who wrote it?",
    );
    assert_eq!(service.complete(&prompt).await.unwrap(), "Ada wrote it.");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[2]["role"], "assistant");
    assert_eq!(messages[3]["content"], "Who wrote it?");
}

#[tokio::test]
async fn test_openai_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({"error": {"message": "bad key"}})),
        )
        .mount(&server)
        .await;

    let service = factory(&server, LlmProvider::OpenAi, 5)
        .connect(&SessionConfig::default())
        .unwrap();
    let err = service
        .complete(&Prompt::answer("", &[], vec![], "q"))
        .await
        .unwrap_err();
    assert!(matches!(err, DocchatError::Completion(_)));
    assert!(err.to_string().contains("401"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_unreachable_backend_is_completion_error() {
    let backend = BackendConfig {
        api_base_url: Some("http://127.0.0.1:1".to_string()),
        timeout_secs: 5,
        ..Default::default()
    };
    let service = BackendFactory::new(backend)
        .connect(&SessionConfig::default())
        .unwrap();
    let err = service
        .complete(&Prompt::answer("", &[], vec![], "q"))
        .await
        .unwrap_err();
    assert!(matches!(err, DocchatError::Completion(_)));
}
