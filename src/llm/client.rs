use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::types::{ChatRequest, ChatResponse};
use crate::config::{OpenAiConfig, RequestConfig};
use crate::error::{AppResult, LlmError, LlmResult};

/// One round trip to a generative text backend.
///
/// Implementations issue exactly one request per call and return the raw
/// message content; retrying and caching live in [`super::LlmCaller`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Ask for a JSON-object reply to a single user message.
    async fn complete(&self, prompt: &str) -> LlmResult<String>;
}

/// Client for the OpenAI chat completions API
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    organization: Option<String>,
    model: String,
    timeout_ms: u64,
}

impl OpenAiClient {
    /// Create a new client
    pub fn new(config: &OpenAiConfig, request_config: &RequestConfig) -> AppResult<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(LlmError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            organization: config.organization.clone(),
            model: config.model.clone(),
            timeout_ms: request_config.timeout_ms,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Model identifier sent with every request
    pub fn model(&self) -> &str {
        &self.model
    }

    fn classify(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else if e.is_connect() {
            LlmError::Connection {
                message: e.to_string(),
            }
        } else {
            LlmError::Http(e)
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiClient {
    async fn complete(&self, prompt: &str) -> LlmResult<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = ChatRequest::json_prompt(&self.model, prompt);

        debug!(model = %self.model, prompt_chars = prompt.len(), "Sending chat completion");
        let start = Instant::now();

        let mut builder = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if let Some(org) = &self.organization {
            builder = builder.header("OpenAI-Organization", org);
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::RateLimited { message: body });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout {
                    timeout_ms: self.timeout_ms,
                }
            } else {
                LlmError::InvalidResponse {
                    message: format!("Failed to parse response: {}", e),
                }
            }
        })?;

        let content = body
            .first_content()
            .ok_or_else(|| LlmError::InvalidResponse {
                message: "Response has no message content".to_string(),
            })?
            .trim()
            .to_string();

        info!(
            model = body.model.as_deref().unwrap_or(&self.model),
            latency_ms = start.elapsed().as_millis(),
            "Chat completion succeeded"
        );
        debug!(response = %content, "Chat completion content");

        Ok(content)
    }
}
