//! Cooldown Persistence
//!
//! A small key-value port the rotation manager writes its cooldown state to,
//! so quarantined keys stay quarantined across restarts.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::{KeyrotError, Result};
use crate::rotation::KeySlot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed key the cooldown document is stored under
pub const STORAGE_KEY: &str = "llm_key_cooldowns";

/// Byte-oriented persistence for the cooldown document
pub trait CooldownStore: Send + Sync + fmt::Debug {
    /// Read the stored document, `None` if nothing was saved yet
    fn load(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the stored document
    fn save(&self, bytes: &[u8]) -> Result<()>;
}

/// One entry of the persisted cooldown document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCooldown {
    pub index: usize,

    /// Milliseconds since the Unix epoch
    pub cooldown_until: i64,
}

impl PersistedCooldown {
    pub fn until(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.cooldown_until)
    }
}

/// Serialize the slots that currently carry a cooldown
pub fn encode_cooldowns(slots: &[KeySlot]) -> Result<Vec<u8>> {
    let entries: Vec<PersistedCooldown> = slots
        .iter()
        .filter_map(|slot| {
            slot.cooldown_until().map(|until| PersistedCooldown {
                index: slot.index(),
                cooldown_until: until.timestamp_millis(),
            })
        })
        .collect();

    serde_json::to_vec(&entries)
        .map_err(|e| KeyrotError::Storage(format!("Failed to encode cooldowns: {}", e)))
}

pub fn decode_cooldowns(bytes: &[u8]) -> Result<Vec<PersistedCooldown>> {
    serde_json::from_slice(bytes)
        .map_err(|e| KeyrotError::Storage(format!("Failed to decode cooldowns: {}", e)))
}
