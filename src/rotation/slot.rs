//! Key Slots
//!
//! One configured provider credential plus its cooldown state.

use chrono::{DateTime, Utc};
use std::fmt;

/// A configured key as handed to the manager
#[derive(Clone, PartialEq, Eq)]
pub struct KeyEntry {
    /// Label used in logs (env var name or config position)
    pub identifier: String,

    /// The actual API key value
    pub secret: String,
}

impl KeyEntry {
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for KeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyEntry")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// A single API key with its cooldown state
#[derive(Clone)]
pub struct KeySlot {
    index: usize,
    identifier: String,
    secret: String,

    /// Time until which this key is rate limited (if any)
    cooldown_until: Option<DateTime<Utc>>,
}

impl KeySlot {
    pub(crate) fn new(index: usize, entry: KeyEntry) -> Self {
        Self {
            index,
            identifier: entry.identifier,
            secret: entry.secret,
            cooldown_until: None,
        }
    }

    /// Position in the configured key list
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Get the key value
    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.cooldown_until
    }

    /// Check if this key is rate limited at `now`
    pub fn is_limited_at(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }

    /// A slot whose cooldown timestamp has passed but was not cleared yet
    pub(crate) fn cooldown_elapsed_at(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| until <= now)
    }

    pub(crate) fn set_cooldown(&mut self, until: DateTime<Utc>) {
        self.cooldown_until = Some(until);
    }

    pub(crate) fn clear_cooldown(&mut self) {
        self.cooldown_until = None;
    }
}

impl fmt::Debug for KeySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySlot")
            .field("index", &self.index)
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .field("cooldown_until", &self.cooldown_until)
            .finish()
    }
}
