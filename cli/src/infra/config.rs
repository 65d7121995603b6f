//! Loads the deployment configuration from a YAML file on disk.

use std::path::{Path, PathBuf};

use crate::domain::config::{DEFAULT_CONFIG_PATH, DeployConfig, validate_config};
use crate::domain::ConfigError;

/// Production configuration source backed by `deploy.yaml`.
pub struct YamlConfigStore {
    path: PathBuf,
}

impl YamlConfigStore {
    /// Use `path` when given, otherwise the system default.
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path: path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read and validate the configuration. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn load(&self) -> Result<DeployConfig, ConfigError> {
        let config = if self.exists() {
            let content =
                std::fs::read_to_string(&self.path).map_err(|e| ConfigError::Unreadable {
                    path: self.path.display().to_string(),
                    message: e.to_string(),
                })?;
            serde_yaml::from_str(&content).map_err(|e| ConfigError::Unreadable {
                path: self.path.display().to_string(),
                message: e.to_string(),
            })?
        } else {
            tracing::debug!(path = %self.path.display(), "config file not found, using defaults");
            DeployConfig::default()
        };
        validate_config(&config)?;
        Ok(config)
    }
}
