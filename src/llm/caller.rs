use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::cache::ResponseCache;
use super::client::ChatBackend;
use crate::config::RequestConfig;
use crate::error::{LlmError, LlmResult};

/// Attempts per prompt before giving up on transient failures.
pub const MAX_ATTEMPTS: u32 = 5;

/// Cached, retrying front end to a [`ChatBackend`].
///
/// Each distinct prompt reaches the backend at most once per cache lifetime;
/// the cache is flushed by the caller, not here.
pub struct LlmCaller {
    backend: Box<dyn ChatBackend>,
    cache: ResponseCache,
    retry_delay: Duration,
}

impl LlmCaller {
    pub fn new(backend: Box<dyn ChatBackend>, cache: ResponseCache, request: &RequestConfig) -> Self {
        Self {
            backend,
            cache,
            retry_delay: Duration::from_millis(request.retry_delay_ms),
        }
    }

    /// Backoff before the retry that follows failed attempt `attempt` (0-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.retry_delay * 2_u32.pow(attempt)
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut ResponseCache {
        &mut self.cache
    }

    /// Send `prompt` and return the parsed JSON reply.
    ///
    /// A reply that is not JSON degrades to an empty object. Transient failures
    /// are retried with exponential backoff; once [`MAX_ATTEMPTS`] are spent the
    /// call fails with [`LlmError::ExhaustedRetries`]. Any other failure is
    /// returned immediately.
    pub async fn call(&mut self, prompt: &str, use_cache: bool) -> LlmResult<Value> {
        if use_cache {
            if let Some(hit) = self.cache.get(prompt) {
                debug!(key = %ResponseCache::key_for(prompt), "Cache hit");
                return Ok(hit.clone());
            }
        }

        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            let start = Instant::now();
            match self.backend.complete(prompt).await {
                Ok(text) => {
                    info!(
                        attempt = attempt,
                        latency_ms = start.elapsed().as_millis(),
                        "LLM call succeeded"
                    );
                    let Some(data) = parse_reply(&text) else {
                        error!(response = %text, "Can't translate reply to JSON");
                        return Ok(Value::Object(Map::new()));
                    };
                    self.cache.insert(prompt, data.clone());
                    return Ok(data);
                }
                Err(e) if e.is_transient() => {
                    let delay = self.backoff_for(attempt);
                    warn!(
                        error = %e,
                        attempt = attempt,
                        delay_ms = delay.as_millis(),
                        "Transient LLM failure, retrying after backoff"
                    );
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(error = %e, "Unexpected error during LLM call");
                    return Err(e);
                }
            }
        }

        Err(LlmError::ExhaustedRetries {
            attempts: MAX_ATTEMPTS,
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
        })
    }
}

/// Parse a reply, tolerating markdown code fences around the JSON.
fn parse_reply(text: &str) -> Option<Value> {
    let json = extract_json_from_completion(text).ok()?;
    serde_json::from_str(json).ok()
}

/// Extract JSON from a completion string, handling markdown code blocks.
///
/// Attempts extraction in this order:
/// 1. Raw JSON (fast path)
/// 2. ```json ... ``` code blocks
/// 3. ``` ... ``` code blocks
pub(crate) fn extract_json_from_completion(completion: &str) -> Result<&str, String> {
    let trimmed = completion.trim();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    if completion.contains("```json") {
        return completion
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ```json block but content was empty or malformed".to_string());
    }

    if completion.contains("```") {
        return completion
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ``` block but content was empty or malformed".to_string());
    }

    Err(format!(
        "No JSON found in response. First 100 chars: '{}'",
        completion.chars().take(100).collect::<String>()
    ))
}
