//! File-backed cooldown store.

use crate::error::{KeyrotError, Result};
use crate::storage::{CooldownStore, STORAGE_KEY};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Stores the cooldown document as `<dir>/llm_key_cooldowns.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a store inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", STORAGE_KEY)),
        }
    }

    /// Store under the platform data directory, if one exists
    pub fn default_location() -> Option<Self> {
        dirs::data_dir().map(|dir| Self::in_dir(dir.join("keyrotate")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CooldownStore for FileStore {
    fn load(&self) -> Result<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(KeyrotError::Storage(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn save(&self, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Write then rename so readers never observe a partial document
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            KeyrotError::Storage(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_failed_rename_removes_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path());

        // A non-empty directory in place of the document makes the rename fail
        std::fs::create_dir_all(store.path().join("occupied")).unwrap();

        let err = store.save(b"[]").unwrap_err();
        assert!(matches!(err, KeyrotError::Storage(_)));
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[test]
    fn test_save_creates_directories() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::in_dir(dir.path().join("nested").join("state"));

        store.save(br#"[{"index":0,"cooldownUntil":1}]"#).unwrap();

        assert!(store.path().ends_with("llm_key_cooldowns.json"));
        assert_eq!(
            store.load().unwrap(),
            Some(br#"[{"index":0,"cooldownUntil":1}]"#.to_vec())
        );
    }
}
