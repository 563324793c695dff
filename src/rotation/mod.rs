//! Rotation Module
//!
//! API key slots, time sources and the round-robin rotation manager.

pub mod clock;
pub mod manager;
pub mod slot;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::{
    clamp_cooldown_minutes, KeyRotationManager, KeyRotationManagerBuilder, SlotStatus,
    DEFAULT_COOLDOWN_MINUTES,
};
pub use slot::{KeyEntry, KeySlot};
