//! Gemini model client - single generateContent POST with typed failure
//! classification and bounded retry.
//!
//! Key points:
//! - API key travels in the URL query param, not a header
//! - 429/5xx are retried with exponential backoff + jitter; key errors
//!   fail immediately and are never retried
//! - after the retry budget is spent, the caller gets an "overloaded"
//!   message that still carries the original status

use crate::error::GenerationError;
use crate::llm::types::{default_safety_settings, GenerationConfig};
use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

pub const GEMINI_MODEL: &str = "gemini-1.5-flash";
pub const GEMINI_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";

const OVERLOADED_MESSAGE: &str =
    "AI model is currently overloaded. Please try again in a few minutes.";

/// Backoff parameters for the in-client retry loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(300),
        }
    }
}

/// The seam the orchestrator generates through. `GeminiClient` is the only
/// production implementation; tests script their own.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<Value, GenerationError>;
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    /// A missing key fails here, before any request is built.
    pub fn new(api_key: impl Into<String>) -> Result<Self, GenerationError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(GenerationError::ApiKeyMissing);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            endpoint: GEMINI_ENDPOINT.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Point the client at a different endpoint (tests use a local mock).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// One POST, no retry. Classifies every failure into the taxonomy.
    async fn call_once(&self, body: &Value) -> Result<Value, GenerationError> {
        let url = format!("{}?key={}", self.endpoint, self.api_key);
        let response = self
            .http
            .post(&url)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                log::error!("[LLM] HTTP request failed: {}", e);
                GenerationError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            let error_body: Value = response.json().await.unwrap_or_default();
            let err = classify_http_error(status.as_u16(), &error_body, retry_after);
            log::error!("[LLM] Gemini API returned {}: {}", status, err);
            return Err(err);
        }

        let data: Value = response.json().await.map_err(|e| {
            GenerationError::UnexpectedFormat(format!("unreadable response body: {}", e))
        })?;

        // Some API errors ride inside a 200 payload.
        if let Some(embedded) = data.get("error") {
            let message = embedded
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unspecified API error")
                .to_string();
            log::error!("[LLM] Gemini API returned embedded error: {}", message);
            return Err(GenerationError::Unknown(message));
        }

        Ok(data)
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<Value, GenerationError> {
        let body = serde_json::json!({
            "contents": [
                { "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": config,
            "safetySettings": default_safety_settings(),
        });

        log::info!(
            "[LLM] Model: {}, prompt: {} chars, maxOutputTokens: {}",
            GEMINI_MODEL,
            prompt.len(),
            config.max_output_tokens
        );

        call_with_retry(&self.retry, || self.call_once(&body)).await
    }
}

/// Map an HTTP failure onto the error taxonomy.
pub(crate) fn classify_http_error(
    status: u16,
    body: &Value,
    retry_after: Option<u64>,
) -> GenerationError {
    let server_message = body
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str());

    match status {
        400 => {
            if server_message.is_some_and(|m| m.contains("API_KEY_INVALID")) {
                GenerationError::ApiKeyInvalid
            } else {
                GenerationError::Unknown(
                    server_message
                        .unwrap_or("Gemini API error. Please try again later.")
                        .to_string(),
                )
            }
        }
        401 | 403 => GenerationError::ApiKeyInvalid,
        429 => {
            let message = match retry_after {
                Some(secs) => format!("Rate limit exceeded. Please wait {} seconds.", secs),
                None => "Rate limit exceeded. Please wait a moment and try again.".to_string(),
            };
            GenerationError::RateLimited {
                message,
                retry_after,
            }
        }
        500 | 502 | 503 => GenerationError::ServiceUnavailable {
            status,
            message: "Gemini service temporarily unavailable. Please try again.".to_string(),
        },
        _ => GenerationError::Unknown(
            server_message
                .unwrap_or("Gemini API error. Please try again later.")
                .to_string(),
        ),
    }
}

/// Retry `call` on transient errors with exponential backoff plus jitter.
///
/// Non-retryable errors (key problems, parse failures, plain 4xx) pass
/// through untouched on the first occurrence. Exhausting the budget turns
/// the last transient error into its "overloaded" form, keeping the
/// variant (and therefore the status) intact.
pub(crate) async fn call_with_retry<F, Fut>(
    policy: &RetryPolicy,
    mut call: F,
) -> Result<Value, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value, GenerationError>>,
{
    let mut attempt: u32 = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                if attempt + 1 >= policy.max_attempts {
                    return Err(overloaded(err));
                }
                let jitter_ms = if policy.max_jitter.is_zero() {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=policy.max_jitter.as_millis() as u64)
                };
                let delay = policy.base_delay * 2u32.pow(attempt)
                    + Duration::from_millis(jitter_ms);
                log::warn!(
                    "[LLM] Transient failure ({}). Retrying in {}ms (attempt {}/{})",
                    err,
                    delay.as_millis(),
                    attempt + 1,
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Rewrite a spent transient error as the user-facing overloaded message,
/// preserving the variant and status.
fn overloaded(err: GenerationError) -> GenerationError {
    match err {
        GenerationError::ServiceUnavailable { status, .. } => GenerationError::ServiceUnavailable {
            status,
            message: OVERLOADED_MESSAGE.to_string(),
        },
        GenerationError::RateLimited { retry_after, .. } => GenerationError::RateLimited {
            message: OVERLOADED_MESSAGE.to_string(),
            retry_after,
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_jitter: Duration::ZERO,
        }
    }

    fn unavailable() -> GenerationError {
        GenerationError::ServiceUnavailable {
            status: 503,
            message: "Gemini service temporarily unavailable. Please try again.".into(),
        }
    }

    #[test]
    fn empty_key_is_rejected_at_construction() {
        assert!(matches!(
            GeminiClient::new(""),
            Err(GenerationError::ApiKeyMissing)
        ));
        assert!(GeminiClient::new("k").is_ok());
    }

    #[test]
    fn status_classification() {
        let key_body = json!({"error": {"message": "API key not valid. API_KEY_INVALID"}});
        assert!(matches!(
            classify_http_error(400, &key_body, None),
            GenerationError::ApiKeyInvalid
        ));
        assert!(matches!(
            classify_http_error(400, &json!({"error": {"message": "bad field"}}), None),
            GenerationError::Unknown(m) if m == "bad field"
        ));
        assert!(matches!(
            classify_http_error(401, &json!({}), None),
            GenerationError::ApiKeyInvalid
        ));
        assert!(matches!(
            classify_http_error(403, &json!({}), None),
            GenerationError::ApiKeyInvalid
        ));
        for status in [500u16, 502, 503] {
            assert!(matches!(
                classify_http_error(status, &json!({}), None),
                GenerationError::ServiceUnavailable { status: s, .. } if s == status
            ));
        }
        assert!(matches!(
            classify_http_error(418, &json!({}), None),
            GenerationError::Unknown(_)
        ));
    }

    #[test]
    fn rate_limit_message_includes_retry_after() {
        match classify_http_error(429, &json!({}), Some(30)) {
            GenerationError::RateLimited {
                message,
                retry_after,
            } => {
                assert!(message.contains("30 seconds"));
                assert_eq!(retry_after, Some(30));
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn retry_law_recovers_within_budget() {
        // 503 four times, success on the fifth attempt.
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = call_with_retry(&fast_policy(5), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 4 {
                    Err(unavailable())
                } else {
                    Ok(json!({"ok": true}))
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn retry_law_exhaustion_surfaces_overloaded() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = call_with_retry(&fast_policy(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(unavailable()) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        match err {
            GenerationError::ServiceUnavailable { status, message } => {
                assert_eq!(status, 503);
                assert!(message.contains("overloaded"));
            }
            other => panic!("expected ServiceUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn key_error_law_never_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = call_with_retry(&fast_policy(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(GenerationError::ApiKeyInvalid) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, GenerationError::ApiKeyInvalid));
    }

    #[tokio::test]
    async fn format_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let err = call_with_retry(&fast_policy(5), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(GenerationError::UnexpectedFormat("bad".into())) }
        })
        .await
        .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(err, GenerationError::UnexpectedFormat(_)));
    }
}
