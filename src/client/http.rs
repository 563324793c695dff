//! HTTP Client
//!
//! Async HTTP client with connection retry and rate limit classification.

use crate::client::rate_limit;
use crate::error::{KeyrotError, Result};
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// HTTP client for the chat provider
#[derive(Debug, Clone)]
pub struct HttpClient {
    /// Inner reqwest client
    client: Client,

    /// Upper bound on time spent retrying connection failures
    max_retry_elapsed: Duration,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| KeyrotError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retry_elapsed: Duration::from_secs(30),
        })
    }

    /// Limit how long connection failures are retried
    pub fn with_max_retry_elapsed(mut self, limit: Duration) -> Self {
        self.max_retry_elapsed = limit;
        self
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(500))
            .with_multiplier(2.0)
            .with_max_interval(Duration::from_secs(10))
            .with_max_elapsed_time(Some(self.max_retry_elapsed))
            .build()
    }

    /// POST a JSON body with bearer authentication and decode the JSON reply.
    ///
    /// Connection failures and timeouts are retried with exponential backoff.
    /// A rate-limit response yields [`KeyrotError::RateLimited`] so the caller
    /// can rotate to another key instead of waiting on this one.
    pub async fn post_json<T, R>(
        &self,
        url: &str,
        body: &T,
        api_key: &str,
        extra_headers: &HeaderMap,
    ) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| KeyrotError::Config(format!("Invalid API key format: {}", e)))?,
        );
        for (key, value) in extra_headers {
            headers.insert(key.clone(), value.clone());
        }

        let body_json = serde_json::to_string(body)
            .map_err(|e| KeyrotError::Request(format!("Failed to encode request: {}", e)))?;

        let send = || {
            let request = self
                .client
                .post(url)
                .headers(headers.clone())
                .body(body_json.clone());
            async move {
                request.send().await.map_err(|e| {
                    if e.is_connect() || e.is_timeout() {
                        tracing::debug!(error = %e, "Transient request failure, retrying");
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        };
        let response = backoff::future::retry(self.backoff(), send).await?;

        let status = response.status();
        if status.is_success() {
            let body = response.text().await?;
            return serde_json::from_str(&body).map_err(|e| {
                KeyrotError::Response(format!(
                    "Failed to parse response: {}. Body: {}",
                    e,
                    truncate(&body, 500)
                ))
            });
        }

        let retry_after = rate_limit::retry_after(response.headers());
        let response_body = response.text().await.unwrap_or_default();

        if rate_limit::is_rate_limit_error(status.as_u16(), &response_body) {
            return Err(KeyrotError::RateLimited { retry_after });
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(KeyrotError::Auth(truncate(&response_body, 500).to_string()));
        }

        Err(KeyrotError::Request(format!(
            "Request failed with status {}: {}",
            status,
            truncate(&response_body, 500)
        )))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
