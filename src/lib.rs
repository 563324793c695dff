//! keyrotate - LLM API key rotation
//!
//! Round-robin rotation over a pool of provider API keys with rate-limit
//! cooldowns that survive restarts, plus a chat relay that uses it.

use std::sync::Arc;

pub mod api;
pub mod chat;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod rotation;
pub mod storage;

pub use chat::ChatRelay;
pub use error::{KeyrotError, Result};
pub use rotation::{KeyEntry, KeyRotationManager, KeySlot, SlotStatus};

use client::HttpClient;
use config::Settings;
use storage::{CooldownStore, FileStore};

/// Build the key manager described by `settings`.
///
/// Keys come from `settings` and the `env` lookup. Cooldowns persist under
/// `storage_dir`, or the platform data directory when that is unset.
pub fn build_manager(
    settings: &Settings,
    env: impl Fn(&str) -> Option<String>,
) -> KeyRotationManager {
    let keys = settings.resolve_keys(env);
    if keys.is_empty() {
        tracing::warn!("No API keys configured; chat requests will be refused");
    } else {
        tracing::info!(count = keys.len(), "Loaded API keys");
    }

    let mut builder = KeyRotationManager::builder(keys).cooldown(settings.cooldown());

    let store = match &settings.storage_dir {
        Some(dir) => Some(FileStore::in_dir(dir)),
        None => FileStore::default_location(),
    };
    match store {
        Some(store) => {
            tracing::debug!(path = %store.path().display(), "Persisting cooldowns");
            builder = builder.store(Arc::new(store) as Arc<dyn CooldownStore>);
        }
        None => tracing::warn!("No data directory available; cooldowns will not persist"),
    }

    builder.build()
}

/// Build a chat relay with a fresh key manager from `settings`
pub fn build_relay(
    settings: &Settings,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ChatRelay> {
    let manager = Arc::new(build_manager(settings, env));
    ChatRelay::new(manager, HttpClient::new()?, settings.provider.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_build_manager_persists_to_storage_dir() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            keys: vec!["sk-a".to_string(), "sk-b".to_string()],
            cooldown_minutes: 10,
            storage_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let manager = build_manager(&settings, |_| None);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.default_cooldown(), Duration::from_secs(600));

        manager.mark_key_limited(1, None);
        assert!(dir.path().join("llm_key_cooldowns.json").exists());

        let reloaded = build_manager(&settings, |_| None);
        assert!(reloaded.snapshot()[1].is_limited);
    }

    #[test]
    fn test_build_relay_rejects_bad_headers() {
        let dir = TempDir::new().unwrap();
        let mut settings = Settings {
            storage_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        settings
            .provider
            .headers
            .insert("bad header".to_string(), "x".to_string());

        assert!(build_relay(&settings, |_| None).is_err());
    }
}
