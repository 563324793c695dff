//! Chat Relay
//!
//! Sends chat completions to the provider, rotating to the next API key
//! whenever the current one is rate limited.

use crate::api::{CompletionRequest, CompletionResponse, Message};
use crate::client::HttpClient;
use crate::config::ProviderConfig;
use crate::error::{KeyrotError, Result};
use crate::rotation::KeyRotationManager;
use reqwest::header::HeaderMap;
use std::collections::HashSet;
use std::sync::Arc;

/// Relays chat requests through the key rotation manager
#[derive(Debug, Clone)]
pub struct ChatRelay {
    keys: Arc<KeyRotationManager>,
    http: HttpClient,
    url: String,
    headers: HeaderMap,
    provider: ProviderConfig,
}

impl ChatRelay {
    pub fn new(
        keys: Arc<KeyRotationManager>,
        http: HttpClient,
        provider: ProviderConfig,
    ) -> Result<Self> {
        Ok(Self {
            keys,
            http,
            url: provider.completions_url(),
            headers: provider.header_map()?,
            provider,
        })
    }

    /// The key manager this relay draws from
    pub fn keys(&self) -> &Arc<KeyRotationManager> {
        &self.keys
    }

    /// Send a completion request.
    ///
    /// Each key is tried at most once per call. A rate-limited key is put
    /// into cooldown and the next one is tried; when none is left the error
    /// is [`KeyrotError::NoKeysConfigured`] or
    /// [`KeyrotError::AllKeysCoolingDown`]. Other failures return at once.
    pub async fn complete(&self, mut request: CompletionRequest) -> Result<CompletionResponse> {
        if request.model.is_empty() {
            request.model = self.provider.model.clone();
        }

        let mut tried = HashSet::new();

        loop {
            let Some(slot) = self.keys.get_next_available_key(&tried) else {
                return Err(self.exhausted());
            };
            tried.insert(slot.index());

            match self
                .http
                .post_json::<_, CompletionResponse>(&self.url, &request, slot.secret(), &self.headers)
                .await
            {
                Ok(response) => {
                    tracing::debug!(key = slot.identifier(), model = %response.model, "Chat completion succeeded");
                    return Ok(response);
                }
                Err(KeyrotError::RateLimited { retry_after }) => {
                    tracing::warn!(
                        key = slot.identifier(),
                        retry_after_secs = retry_after.map(|d| d.as_secs()),
                        "Provider rate limited API key, rotating"
                    );
                    self.keys.mark_key_limited(slot.index(), retry_after);
                }
                Err(e) => {
                    tracing::error!(key = slot.identifier(), error = %e, "Chat completion failed");
                    return Err(e);
                }
            }
        }
    }

    /// Ask a single question and return the answer text
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.provider.system_prompt {
            messages.push(Message::system(system.as_str()));
        }
        messages.push(Message::user(prompt));

        let mut request = CompletionRequest::new(self.provider.model.as_str(), messages);
        request.temperature = self.provider.temperature;
        request.max_tokens = self.provider.max_tokens;

        let response = self.complete(request).await?;
        response
            .content()
            .ok_or_else(|| KeyrotError::Response("Provider returned no choices".to_string()))
    }

    fn exhausted(&self) -> KeyrotError {
        if self.keys.is_empty() {
            tracing::error!("No API keys configured for chat relay");
            KeyrotError::NoKeysConfigured
        } else {
            let retry_in = self.keys.next_available_in();
            tracing::warn!(
                limited = self.keys.limited_count(),
                total = self.keys.len(),
                "All API keys are cooling down"
            );
            KeyrotError::AllKeysCoolingDown { retry_in }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotation::clock::Clock;
    use crate::rotation::{KeyEntry, ManualClock};
    use std::time::Duration;

    const OK_BODY: &str = r#"{
        "id": "gen-1",
        "model": "test-model",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Hi there" } }]
    }"#;

    fn relay_for(url: &str, keys: &[&str]) -> (ChatRelay, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let entries = keys
            .iter()
            .map(|k| KeyEntry::new(format!("id-{}", k), *k))
            .collect();
        let manager = KeyRotationManager::builder(entries)
            .cooldown(Duration::from_secs(60))
            .clock(clock.clone())
            .build();

        let provider = ProviderConfig {
            base_url: url.to_string(),
            model: "test-model".to_string(),
            system_prompt: Some("You answer questions about my projects.".to_string()),
            ..Default::default()
        };
        let http = HttpClient::new()
            .unwrap()
            .with_max_retry_elapsed(Duration::from_millis(100));

        (
            ChatRelay::new(Arc::new(manager), http, provider).unwrap(),
            clock,
        )
    }

    #[tokio::test]
    async fn test_rotates_past_rate_limited_key() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-a")
            .with_status(429)
            .with_header("retry-after", "120")
            .create_async()
            .await;
        let ok = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-b")
            .with_status(200)
            .with_body(OK_BODY)
            .create_async()
            .await;

        let (relay, _clock) = relay_for(&server.url(), &["sk-a", "sk-b"]);
        let answer = relay.ask("What do you build?").await.unwrap();

        assert_eq!(answer, "Hi there");
        limited.assert_async().await;
        ok.assert_async().await;

        let snapshot = relay.keys().snapshot();
        assert!(snapshot[0].is_limited);
        assert!(!snapshot[1].is_limited);
    }

    #[tokio::test]
    async fn test_all_keys_limited_reports_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let limited = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .expect(2)
            .create_async()
            .await;

        let (relay, clock) = relay_for(&server.url(), &["sk-a", "sk-b"]);
        let err = relay.ask("hello").await.unwrap_err();

        assert!(err.is_unavailable());
        match err {
            KeyrotError::AllKeysCoolingDown { retry_in } => {
                assert_eq!(retry_in, Some(Duration::from_secs(60)))
            }
            other => panic!("expected cooldown error, got {:?}", other),
        }
        limited.assert_async().await;

        // Nothing is sent while every key is cooling down
        let err = relay.ask("hello again").await.unwrap_err();
        assert!(matches!(err, KeyrotError::AllKeysCoolingDown { .. }));
        limited.assert_async().await;

        clock.advance(Duration::from_secs(60));
        assert!(relay.keys().get_next_available_key(&HashSet::new()).is_some());
    }

    #[tokio::test]
    async fn test_no_keys_configured() {
        let (relay, _clock) = relay_for("http://127.0.0.1:9", &[]);
        let err = relay.ask("hello").await.unwrap_err();
        assert!(matches!(err, KeyrotError::NoKeysConfigured));
    }

    #[tokio::test]
    async fn test_malformed_retry_after_uses_default_cooldown() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-a")
            .with_status(429)
            .with_header("retry-after", "-1s")
            .create_async()
            .await;
        server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-b")
            .with_status(200)
            .with_body(OK_BODY)
            .create_async()
            .await;

        let (relay, clock) = relay_for(&server.url(), &["sk-a", "sk-b"]);
        let answer = relay.ask("hello").await.unwrap();
        assert_eq!(answer, "Hi there");

        let until = relay.keys().snapshot()[0].cooldown_until.unwrap();
        assert_eq!(until - clock.now(), chrono::Duration::seconds(60));
    }

    #[tokio::test]
    async fn test_other_errors_do_not_rotate() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("upstream exploded")
            .expect(1)
            .create_async()
            .await;

        let (relay, _clock) = relay_for(&server.url(), &["sk-a", "sk-b"]);
        let err = relay.ask("hello").await.unwrap_err();

        assert!(matches!(err, KeyrotError::Request(_)));
        assert_eq!(relay.keys().limited_count(), 0);
        failing.assert_async().await;
    }

    #[tokio::test]
    async fn test_request_model_defaults_from_config() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::PartialJson(
                serde_json::json!({ "model": "test-model" }),
            ))
            .with_status(200)
            .with_body(OK_BODY)
            .create_async()
            .await;

        let (relay, _clock) = relay_for(&server.url(), &["sk-a"]);
        let request = CompletionRequest::new("", vec![Message::user("hi")]);
        relay.complete(request).await.unwrap();

        ok.assert_async().await;
    }
}
