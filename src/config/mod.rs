//! Configuration management for aotguard

pub mod schema;

pub use schema::{BootImageConfig, CacheConfig, Config, RuntimeConfig};

use crate::error::{GovernorError, GovernorResult};
use crate::isa::InstructionSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aotguard")
            .join("config.toml")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> GovernorResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> GovernorResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| GovernorError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| GovernorError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> GovernorResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            GovernorError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> GovernorResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| GovernorError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Ensure the per-architecture cache directory exists
    pub async fn ensure_cache_dir(config: &Config, isa: InstructionSet) -> GovernorResult<PathBuf> {
        let dir = config.cache.root.join(isa.as_str());
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| GovernorError::io(format!("creating directory {}", dir.display()), e))?;
        Ok(dir)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_default_when_missing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nonexistent.toml");
        let manager = ConfigManager::with_path(path);

        let config = manager.load().await.unwrap();
        assert_eq!(config.runtime.compiler_executable, "dex2aot");
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        let manager = ConfigManager::with_path(path);

        let mut config = Config::default();
        config.runtime.compiler_executable = "/opt/bin/compiler".to_string();

        manager.save(&config).await.unwrap();
        let loaded = manager.load().await.unwrap();

        assert_eq!(loaded.runtime.compiler_executable, "/opt/bin/compiler");
    }

    #[tokio::test]
    async fn invalid_config_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[runtime]\ncompilation_enabled = \"yes\"\n").unwrap();

        let err = ConfigManager::with_path(path.clone()).load().await.unwrap_err();
        assert!(matches!(err, GovernorError::ConfigInvalid { path: p, .. } if p == path));
    }

    #[tokio::test]
    async fn creates_cache_dir() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.cache.root = temp.path().join("cache");

        let dir = ConfigManager::ensure_cache_dir(&config, InstructionSet::Arm64)
            .await
            .unwrap();
        assert_eq!(dir, temp.path().join("cache/arm64"));
        assert!(dir.is_dir());
    }
}
