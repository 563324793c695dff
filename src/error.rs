//! Keyrotate Error Types
//!
//! Error handling for key rotation, persistence and the chat relay.

use std::time::Duration;
use thiserror::Error;

/// Message shown to end users when no provider key can serve a request
pub const UNAVAILABLE_MESSAGE: &str =
    "The assistant is temporarily unavailable. Please try again in a few minutes.";

/// Main error type for keyrotate operations
#[derive(Debug, Error)]
pub enum KeyrotError {
    /// Configuration errors (invalid JSON, unreadable file, bad values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The key list is empty; permanent until keys are configured
    #[error("No API keys configured. Set KEYROTATE_API_KEYS or add keys in keyrotate.json")]
    NoKeysConfigured,

    /// Every configured key is cooling down; resolves once a cooldown elapses
    #[error("All API keys are cooling down{}", format_retry(.retry_in))]
    AllKeysCoolingDown { retry_in: Option<Duration> },

    /// Cooldown persistence failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// The provider rejected the request with a rate-limit condition
    #[error("Rate limited by provider{}", format_retry(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    /// Authentication failed
    #[error("Authentication failed: {0}. Check your API key.")]
    Auth(String),

    /// HTTP request failed
    #[error("Request failed: {0}")]
    Request(String),

    /// Response parsing failed
    #[error("Response error: {0}")]
    Response(String),

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
}

fn format_retry(wait: &Option<Duration>) -> String {
    match wait {
        Some(d) => format!(", retry after {} seconds", d.as_secs().max(1)),
        None => String::new(),
    }
}

impl KeyrotError {
    /// Whether this error means "no key can serve the request right now"
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            KeyrotError::NoKeysConfigured
                | KeyrotError::AllKeysCoolingDown { .. }
                | KeyrotError::RateLimited { .. }
        )
    }

    /// Text suitable for an end user; internal details stay in the logs
    pub fn user_message(&self) -> String {
        if self.is_unavailable() {
            UNAVAILABLE_MESSAGE.to_string()
        } else {
            "Something went wrong while contacting the assistant.".to_string()
        }
    }
}

impl From<reqwest::Error> for KeyrotError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            KeyrotError::Timeout(err.to_string())
        } else if err.is_connect() {
            KeyrotError::Request(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            KeyrotError::Response(format!("Failed to decode response: {}", err))
        } else {
            KeyrotError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for KeyrotError {
    fn from(err: serde_json::Error) -> Self {
        KeyrotError::Response(format!("JSON parsing error: {}", err))
    }
}

impl From<std::io::Error> for KeyrotError {
    fn from(err: std::io::Error) -> Self {
        KeyrotError::Storage(format!("IO error: {}", err))
    }
}

/// Result type alias for keyrotate operations
pub type Result<T> = std::result::Result<T, KeyrotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_errors_share_user_message() {
        let errors = [
            KeyrotError::NoKeysConfigured,
            KeyrotError::AllKeysCoolingDown { retry_in: None },
            KeyrotError::RateLimited {
                retry_after: Some(Duration::from_secs(30)),
            },
        ];

        for err in errors {
            assert!(err.is_unavailable());
            assert_eq!(err.user_message(), UNAVAILABLE_MESSAGE);
        }

        assert!(!KeyrotError::Auth("bad key".into()).is_unavailable());
    }

    #[test]
    fn test_display_includes_retry_hint() {
        let err = KeyrotError::AllKeysCoolingDown {
            retry_in: Some(Duration::from_secs(90)),
        };
        assert_eq!(
            err.to_string(),
            "All API keys are cooling down, retry after 90 seconds"
        );

        let err = KeyrotError::RateLimited { retry_after: None };
        assert_eq!(err.to_string(), "Rate limited by provider");
    }
}
