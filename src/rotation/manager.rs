//! Key Rotation Manager
//!
//! Round-robin selection over the configured provider keys, skipping keys that
//! are cooling down after a rate-limit response. Cooldowns expire lazily on
//! the next selection and are persisted through a [`CooldownStore`].

use crate::rotation::clock::{Clock, SystemClock};
use crate::rotation::slot::{KeyEntry, KeySlot};
use crate::storage::{decode_cooldowns, encode_cooldowns, CooldownStore};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Default cooldown applied to a limited key, in minutes
pub const DEFAULT_COOLDOWN_MINUTES: u64 = 15;

/// Bounds for the configured default cooldown, in minutes
pub const MIN_COOLDOWN_MINUTES: u64 = 1;
pub const MAX_COOLDOWN_MINUTES: u64 = 24 * 60;

const MAX_COOLDOWN: Duration = Duration::from_secs(MAX_COOLDOWN_MINUTES * 60);

/// Clamp a configured cooldown (in minutes) into the supported range
pub fn clamp_cooldown_minutes(minutes: u64) -> Duration {
    let minutes = minutes.clamp(MIN_COOLDOWN_MINUTES, MAX_COOLDOWN_MINUTES);
    Duration::from_secs(minutes * 60)
}

/// Diagnostic view of one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotStatus {
    pub index: usize,
    pub identifier: String,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub is_limited: bool,
}

#[derive(Debug)]
struct RotationState {
    slots: Vec<KeySlot>,

    /// Index of the most recently returned slot
    last_used: Option<usize>,
}

/// Rotates through provider API keys with rate-limit cooldowns
#[derive(Debug)]
pub struct KeyRotationManager {
    state: Mutex<RotationState>,
    default_cooldown: Duration,
    store: Option<Arc<dyn CooldownStore>>,
    clock: Arc<dyn Clock>,
}

/// Builder for [`KeyRotationManager`]
#[derive(Debug)]
pub struct KeyRotationManagerBuilder {
    keys: Vec<KeyEntry>,
    default_cooldown: Duration,
    store: Option<Arc<dyn CooldownStore>>,
    clock: Arc<dyn Clock>,
}

impl KeyRotationManagerBuilder {
    /// Default cooldown in minutes, clamped to 1..=1440
    pub fn cooldown_minutes(mut self, minutes: u64) -> Self {
        self.default_cooldown = clamp_cooldown_minutes(minutes);
        self
    }

    /// Default cooldown as an exact duration (capped at 24 hours)
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.default_cooldown = cooldown.min(MAX_COOLDOWN);
        self
    }

    pub fn store(mut self, store: Arc<dyn CooldownStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the manager, restoring persisted cooldowns when a store is set
    pub fn build(self) -> KeyRotationManager {
        let slots = self
            .keys
            .into_iter()
            .enumerate()
            .map(|(index, entry)| KeySlot::new(index, entry))
            .collect();

        let manager = KeyRotationManager {
            state: Mutex::new(RotationState {
                slots,
                last_used: None,
            }),
            default_cooldown: self.default_cooldown,
            store: self.store,
            clock: self.clock,
        };
        manager.restore();
        manager
    }
}

impl KeyRotationManager {
    /// Start building a manager over `keys`, in rotation order
    pub fn builder(keys: Vec<KeyEntry>) -> KeyRotationManagerBuilder {
        KeyRotationManagerBuilder {
            keys,
            default_cooldown: clamp_cooldown_minutes(DEFAULT_COOLDOWN_MINUTES),
            store: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Manager with default cooldown, no persistence and the system clock
    pub fn new(keys: Vec<KeyEntry>) -> Self {
        Self::builder(keys).build()
    }

    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().slots.is_empty()
    }

    pub fn default_cooldown(&self) -> Duration {
        self.default_cooldown
    }

    /// Get the next usable key in round-robin order.
    ///
    /// Elapsed cooldowns are cleared first. The scan starts after the last
    /// returned index, visits every slot at most once and skips `excluded`.
    /// Returns `None` when no slot is usable.
    pub fn get_next_available_key(&self, excluded: &HashSet<usize>) -> Option<KeySlot> {
        let mut state = self.state.lock();
        let count = state.slots.len();
        if count == 0 {
            return None;
        }

        let now = self.clock.now();
        let mut cleared = 0;
        for slot in state.slots.iter_mut().filter(|s| s.cooldown_elapsed_at(now)) {
            tracing::debug!(index = slot.index(), key = slot.identifier(), "Cooldown elapsed");
            slot.clear_cooldown();
            cleared += 1;
        }
        if cleared > 0 {
            self.persist(&state.slots);
        }

        let start = state.last_used.map(|i| (i + 1) % count).unwrap_or(0);
        let picked = (0..count)
            .map(|offset| (start + offset) % count)
            .filter(|idx| !excluded.contains(idx))
            .find(|&idx| state.slots[idx].cooldown_until().is_none())?;

        state.last_used = Some(picked);
        let slot = state.slots[picked].clone();
        tracing::debug!(index = picked, key = slot.identifier(), "Selected API key");
        Some(slot)
    }

    /// Put a key into cooldown.
    ///
    /// Uses the configured default when `cooldown` is `None`. Calling again
    /// before expiry overwrites the previous cooldown.
    pub fn mark_key_limited(&self, index: usize, cooldown: Option<Duration>) {
        let mut state = self.state.lock();
        let now = self.clock.now();
        let cooldown = cooldown.unwrap_or(self.default_cooldown).min(MAX_COOLDOWN);

        let Some(slot) = state.slots.get_mut(index) else {
            tracing::warn!(index, "Ignoring rate limit report for unknown key index");
            return;
        };

        let until = chrono::Duration::from_std(cooldown)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(now);
        slot.set_cooldown(until);
        tracing::info!(
            index,
            key = slot.identifier(),
            cooldown_secs = cooldown.as_secs(),
            "API key marked as rate limited"
        );

        self.persist(&state.slots);
    }

    /// Lift a key's cooldown immediately
    pub fn clear_cooldown(&self, index: usize) {
        let mut state = self.state.lock();
        let Some(slot) = state.slots.get_mut(index) else {
            tracing::warn!(index, "Ignoring cooldown reset for unknown key index");
            return;
        };
        if slot.cooldown_until().is_none() {
            return;
        }

        slot.clear_cooldown();
        tracing::info!(index, key = slot.identifier(), "API key cooldown cleared");
        self.persist(&state.slots);
    }

    /// Read-only view of every slot
    pub fn snapshot(&self) -> Vec<SlotStatus> {
        let state = self.state.lock();
        let now = self.clock.now();

        state
            .slots
            .iter()
            .map(|slot| SlotStatus {
                index: slot.index(),
                identifier: slot.identifier().to_string(),
                cooldown_until: slot.cooldown_until(),
                is_limited: slot.is_limited_at(now),
            })
            .collect()
    }

    /// Number of keys currently cooling down
    pub fn limited_count(&self) -> usize {
        let state = self.state.lock();
        let now = self.clock.now();
        state.slots.iter().filter(|s| s.is_limited_at(now)).count()
    }

    /// Time until the soonest cooldown elapses, or `None` if a key is usable now
    pub fn next_available_in(&self) -> Option<Duration> {
        let state = self.state.lock();
        let now = self.clock.now();

        if state.slots.iter().any(|s| !s.is_limited_at(now)) {
            return None;
        }

        state
            .slots
            .iter()
            .filter_map(|s| s.cooldown_until())
            .min()
            .and_then(|until| (until - now).to_std().ok())
    }

    fn restore(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let entries = match store.load() {
            Ok(Some(bytes)) => match decode_cooldowns(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring unreadable cooldown state");
                    return;
                }
            },
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load cooldown state");
                return;
            }
        };

        let now = self.clock.now();
        let latest = chrono::Duration::from_std(MAX_COOLDOWN)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(now);

        let mut state = self.state.lock();
        let mut restored = 0;
        for entry in entries {
            match (state.slots.get_mut(entry.index), entry.until()) {
                (Some(slot), Some(until)) => {
                    // A skewed or edited document never extends past the cap
                    slot.set_cooldown(until.min(latest));
                    restored += 1;
                }
                _ => tracing::debug!(index = entry.index, "Skipping stale cooldown entry"),
            }
        }

        if restored > 0 {
            tracing::info!(restored, "Restored API key cooldowns");
        }
    }

    /// Best-effort write of the current cooldowns
    fn persist(&self, slots: &[KeySlot]) {
        let Some(store) = &self.store else {
            return;
        };

        let result = encode_cooldowns(slots).and_then(|bytes| store.save(&bytes));
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist cooldown state");
        }
    }
}
