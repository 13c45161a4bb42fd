//! Integration tests for the OpenAI chat backend
//!
//! Tests HTTP client behavior using wiremock for request/response mocking.

use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use gosr::config::{OpenAiConfig, RequestConfig};
use gosr::error::LlmError;
use gosr::llm::{ChatBackend, LlmCaller, OpenAiClient, ResponseCache};

/// Create a test client pointing to mock server
fn create_test_client(base_url: &str) -> OpenAiClient {
    let config = OpenAiConfig {
        api_key: Some("test-api-key".to_string()),
        organization: None,
        base_url: base_url.to_string(),
        model: "gpt-4o".to_string(),
    };
    let request_config = RequestConfig {
        timeout_ms: 5000,
        retry_delay_ms: 1,
    };
    OpenAiClient::new(&config, &request_config).expect("Failed to create client")
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "model": "gpt-4o-2024-08-06",
        "choices": [{
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 10, "total_tokens": 30}
    })
}

#[tokio::test]
async fn test_successful_completion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer test-api-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "response_format": {"type": "json_object"},
            "messages": [{"role": "user", "content": "List obstacles"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("  {\"items\": []}\n")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri());
    let content = client.complete("List obstacles").await.unwrap();
    assert_eq!(content, "{\"items\": []}");
}

#[tokio::test]
async fn test_rate_limit_is_transient() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri());
    let err = client.complete("prompt").await.unwrap_err();
    assert!(matches!(&err, LlmError::RateLimited { message } if message == "slow down"));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri());
    let err = client.complete("prompt").await.unwrap_err();
    assert!(matches!(err, LlmError::Api { status: 500, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_missing_content_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri());
    let err = client.complete("prompt").await.unwrap_err();
    assert!(matches!(err, LlmError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_caller_retries_rate_limits_then_gives_up() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .expect(5)
        .mount(&mock_server)
        .await;

    let client = create_test_client(&mock_server.uri());
    let mut caller = LlmCaller::new(
        Box::new(client),
        ResponseCache::in_memory(),
        &RequestConfig {
            timeout_ms: 5000,
            retry_delay_ms: 1,
        },
    );
    let err = caller.call("prompt", true).await.unwrap_err();
    assert!(matches!(err, LlmError::ExhaustedRetries { attempts: 5, .. }));
}

#[tokio::test]
async fn test_caller_caches_replies_on_disk() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("```json\n{\"title\": \"t\"}\n```")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("cache4.json");
    let request = RequestConfig::default();

    let mut caller = LlmCaller::new(
        Box::new(create_test_client(&mock_server.uri())),
        ResponseCache::load(&cache_path),
        &request,
    );
    assert_eq!(caller.call("prompt", true).await.unwrap(), json!({"title": "t"}));
    assert_eq!(caller.call("prompt", true).await.unwrap(), json!({"title": "t"}));
    caller.cache_mut().flush().unwrap();

    // A fresh caller answers from the file without touching the server
    let mut replay = LlmCaller::new(
        Box::new(create_test_client(&mock_server.uri())),
        ResponseCache::load(&cache_path),
        &request,
    );
    assert_eq!(replay.call("prompt", true).await.unwrap(), json!({"title": "t"}));
}
