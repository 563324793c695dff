//! Configuration Module
//!
//! Handles settings loading and validation.

pub mod loader;
pub mod provider;

pub use loader::ConfigLoader;
pub use provider::{ProviderConfig, Settings, KEYS_ENV, NUMBERED_KEY_ENV_PREFIX};
