//! OpenAI-compatible chat completion client.
//!
//! Every request is paced by the provider's [`Throttle`] and retried with
//! exponential backoff on rate limiting (honouring `Retry-After`), 5xx
//! responses and transport timeouts.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::ChatProviderConfig;

use super::error::AiError;
use super::throttle::Throttle;

const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Upper bound on a single backoff wait, including `Retry-After`.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Retry schedule for one provider.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts including the first.
    pub max_attempts: u32,
    /// Wait before the second attempt; doubles each retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Wait before attempt `attempt + 1`, given the failure of `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32, error: &AiError) -> Duration {
        if let AiError::RateLimited { retry_after, .. } = error
            && *retry_after > 0
        {
            return Duration::from_secs(*retry_after).min(MAX_BACKOFF);
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// A paced, retrying sender shared by the chat and recognition clients.
#[derive(Debug)]
pub(crate) struct Sender {
    pub(crate) provider: &'static str,
    pub(crate) retry: RetryPolicy,
    pub(crate) throttle: Throttle,
}

impl Sender {
    /// Send the request built by `build` until it succeeds or attempts run out.
    ///
    /// `build` is called once per attempt since request builders are consumed.
    pub(crate) async fn send<F>(&self, build: F) -> Result<Response, AiError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            self.throttle.acquire().await;

            let result = match build().send().await {
                Ok(response) => check_status(self.provider, response),
                Err(e) => Err(AiError::Http(e)),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_after(attempt, &e);
                    tracing::warn!(
                        provider = self.provider,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Upstream request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(provider = self.provider, attempt, error = %e, "Upstream request failed");
                    return Err(e);
                }
            }
        }
    }
}

fn check_status(provider: &'static str, response: Response) -> Result<Response, AiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0);
        return Err(AiError::RateLimited {
            provider,
            retry_after,
        });
    }

    Err(AiError::Status {
        provider,
        status: status.as_u16(),
    })
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Chat completion client for one provider.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<ChatClientInner>,
}

struct ChatClientInner {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<SecretString>,
    model: String,
    sender: Sender,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("provider", &self.inner.sender.provider)
            .field("api_url", &self.inner.api_url)
            .field("model", &self.inner.model)
            .field("configured", &self.inner.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// Create a client for `provider` using a shared HTTP client.
    #[must_use]
    pub fn new(
        provider: &'static str,
        config: &ChatProviderConfig,
        http: reqwest::Client,
        retry: RetryPolicy,
        throttle: Throttle,
    ) -> Self {
        Self {
            inner: Arc::new(ChatClientInner {
                http,
                api_url: config.api_url.clone(),
                api_key: config.api_key.clone(),
                model: config.model.clone(),
                sender: Sender {
                    provider,
                    retry,
                    throttle,
                },
            }),
        }
    }

    /// Whether an API key is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.inner.api_key.is_some()
    }

    /// Send one system + user exchange and return the reply text.
    ///
    /// # Errors
    ///
    /// Returns `AiError::NotConfigured` without a key, otherwise the last
    /// failure once retries are exhausted.
    #[instrument(skip_all, fields(provider = self.inner.sender.provider, model = %self.inner.model))]
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, AiError> {
        let inner = &self.inner;
        let api_key = inner
            .api_key
            .as_ref()
            .ok_or(AiError::NotConfigured(inner.sender.provider))?;

        let request = ChatRequest {
            model: &inner.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        };

        let response = inner
            .sender
            .send(|| {
                inner
                    .http
                    .post(&inner.api_url)
                    .bearer_auth(api_key.expose_secret())
                    .json(&request)
            })
            .await?;

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AiError::Parse(format!("chat response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| AiError::Parse("chat response had no content".to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use axum::{Json, Router, http::StatusCode as AxumStatus, response::IntoResponse, routing::post};

    use super::*;

    fn fast_client(api_url: String, max_attempts: u32) -> ChatClient {
        ChatClient::new(
            "general",
            &ChatProviderConfig {
                api_url,
                api_key: Some(SecretString::from("test-key")),
                model: "test-model".into(),
            },
            reqwest::Client::new(),
            RetryPolicy {
                max_attempts,
                base_delay: Duration::from_millis(10),
            },
            Throttle::new(Duration::ZERO, 600),
        )
    }

    /// Serve a provider that fails `failures` times with `status` then answers.
    async fn flaky_provider(failures: u32, status: AxumStatus) -> (String, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move || {
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < failures {
                        return (status, [("Retry-After", "0")], "busy").into_response();
                    }
                    Json(serde_json::json!({
                        "choices": [{"message": {"role": "assistant", "content": " Water at dawn. "}}]
                    }))
                    .into_response()
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.ok() });
        (format!("http://{addr}/v1/chat/completions"), calls)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        let err = AiError::Status {
            provider: "general",
            status: 503,
        };
        assert_eq!(policy.delay_after(1, &err), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2, &err), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(20, &err), MAX_BACKOFF);
    }

    #[test]
    fn test_backoff_honours_retry_after() {
        let policy = RetryPolicy::default();
        let err = AiError::RateLimited {
            provider: "general",
            retry_after: 7,
        };
        assert_eq!(policy.delay_after(1, &err), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let (url, calls) = flaky_provider(2, AxumStatus::SERVICE_UNAVAILABLE).await;
        let reply = fast_client(url, 3).complete("sys", "hi").await.unwrap();
        assert_eq!(reply, "Water at dawn.");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_rate_limit() {
        let (url, calls) = flaky_provider(1, AxumStatus::TOO_MANY_REQUESTS).await;
        fast_client(url, 3).complete("sys", "hi").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let (url, calls) = flaky_provider(10, AxumStatus::BAD_GATEWAY).await;
        let err = fast_client(url, 3).complete("sys", "hi").await.unwrap_err();
        assert!(matches!(err, AiError::Status { status: 502, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (url, calls) = flaky_provider(10, AxumStatus::BAD_REQUEST).await;
        assert!(fast_client(url, 3).complete("sys", "hi").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_provider() {
        let client = ChatClient::new(
            "local",
            &ChatProviderConfig {
                api_url: "http://127.0.0.1:1".into(),
                api_key: None,
                model: "m".into(),
            },
            reqwest::Client::new(),
            RetryPolicy::default(),
            Throttle::new(Duration::ZERO, 10),
        );
        assert!(!client.is_configured());
        assert!(matches!(
            client.complete("s", "u").await,
            Err(AiError::NotConfigured("local"))
        ));
    }
}
