//! In-memory cooldown store.

use crate::error::Result;
use crate::storage::CooldownStore;
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared in-memory store; clones point at the same document
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Arc<Mutex<Option<Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current raw document, if any
    pub fn contents(&self) -> Option<Vec<u8>> {
        self.document.lock().clone()
    }
}

impl CooldownStore for MemoryStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        Ok(self.document.lock().clone())
    }

    fn save(&self, bytes: &[u8]) -> Result<()> {
        *self.document.lock() = Some(bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_document() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());

        let other = store.clone();
        other.save(b"[]").unwrap();

        assert_eq!(store.load().unwrap(), Some(b"[]".to_vec()));
    }
}
