//! Configuration Loader
//!
//! Loads settings from a JSON file and applies environment overrides.

use crate::config::provider::Settings;
use crate::error::{KeyrotError, Result};
use std::path::{Path, PathBuf};

/// Path of an explicit config file
pub const CONFIG_PATH_ENV: &str = "KEYROTATE_CONFIG";

/// Configuration loader with support for multiple sources
#[derive(Debug, Default)]
pub struct ConfigLoader {
    settings: Settings,
    source: Option<PathBuf>,
}

impl ConfigLoader {
    /// Load from the first config file found, then apply the environment
    pub fn new() -> Result<Self> {
        let mut loader = Self::default();

        if let Some(path) = Self::get_config_paths().into_iter().find(|p| p.exists()) {
            loader.load_from_file(&path)?;
        }

        loader.apply_env(|name| std::env::var(name).ok())?;
        Ok(loader)
    }

    /// Create a loader with a specific config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut loader = Self::default();
        loader.load_from_file(path)?;
        loader.apply_env(|name| std::env::var(name).ok())?;
        Ok(loader)
    }

    /// Get list of config paths to check, in priority order
    fn get_config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(custom_path) = std::env::var(CONFIG_PATH_ENV) {
            paths.push(PathBuf::from(custom_path));
        }

        paths.push(PathBuf::from("keyrotate.json"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("keyrotate").join("config.json"));
        }

        paths
    }

    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            KeyrotError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        self.settings = serde_json::from_str(&content).map_err(|e| {
            KeyrotError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        self.source = Some(path.to_path_buf());

        tracing::debug!(path = %path.display(), "Loaded configuration file");
        Ok(())
    }

    /// Apply `KEYROTATE_*` overrides from an environment lookup
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = env("KEYROTATE_BASE_URL") {
            self.settings.provider.base_url = url;
        }

        if let Some(model) = env("KEYROTATE_MODEL") {
            self.settings.provider.model = model;
        }

        if let Some(minutes) = env("KEYROTATE_COOLDOWN_MINUTES") {
            self.settings.cooldown_minutes = minutes.trim().parse().map_err(|e| {
                KeyrotError::Config(format!(
                    "KEYROTATE_COOLDOWN_MINUTES must be a whole number of minutes: {}",
                    e
                ))
            })?;
        }

        if let Some(dir) = env("KEYROTATE_STORAGE_DIR") {
            self.settings.storage_dir = Some(PathBuf::from(dir));
        }

        Ok(())
    }

    /// Get the loaded configuration
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// File the settings came from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Take ownership of the configuration
    pub fn into_settings(self) -> Settings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_from_custom_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{
                "provider": {{
                    "base_url": "https://custom.api.com/v1",
                    "model": "custom-model"
                }},
                "keys_env": ["CUSTOM_API_KEY"],
                "cooldown_minutes": 30
            }}"#
        )
        .unwrap();

        let mut loader = ConfigLoader::default();
        loader.load_from_file(file.path()).unwrap();

        assert_eq!(loader.source(), Some(file.path()));
        let settings = loader.settings();
        assert_eq!(settings.provider.base_url, "https://custom.api.com/v1");
        assert_eq!(settings.provider.model, "custom-model");
        assert_eq!(settings.keys_env, vec!["CUSTOM_API_KEY".to_string()]);
        assert_eq!(settings.cooldown_minutes, 30);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{{ not json").unwrap();

        let mut loader = ConfigLoader::default();
        let err = loader.load_from_file(file.path()).unwrap_err();
        assert!(matches!(err, KeyrotError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("KEYROTATE_BASE_URL", "http://localhost:8080/v1"),
            ("KEYROTATE_MODEL", "local-model"),
            ("KEYROTATE_COOLDOWN_MINUTES", " 45 "),
            ("KEYROTATE_STORAGE_DIR", "/var/lib/keyrotate"),
        ]
        .into_iter()
        .collect();

        let mut loader = ConfigLoader::default();
        loader
            .apply_env(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        let settings = loader.into_settings();
        assert_eq!(settings.provider.base_url, "http://localhost:8080/v1");
        assert_eq!(settings.provider.model, "local-model");
        assert_eq!(settings.cooldown_minutes, 45);
        assert_eq!(
            settings.storage_dir,
            Some(PathBuf::from("/var/lib/keyrotate"))
        );
    }

    #[test]
    fn test_bad_cooldown_env_is_rejected() {
        let mut loader = ConfigLoader::default();
        let result = loader.apply_env(|name| {
            (name == "KEYROTATE_COOLDOWN_MINUTES").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }
}
