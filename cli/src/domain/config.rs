//! Domain types and validators for the deployment configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::retry::RetryPolicy;

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_CONFIG_PATH: &str = "/etc/tynkerbase/deploy.yaml";
pub const DEFAULT_INSTALL_ROOT: &str = "/usr/share/tynkerbase-agent";
pub const DEFAULT_ENTRY_POINT: &str = "/usr/local/bin/tyb_agent";
pub const DEFAULT_WORKSPACE_ROOT: &str = "/tynkerbase-projects";
pub const DEFAULT_EXECUTABLE: &str = "target/release/tynkerbase-agent";
pub const DEFAULT_SOURCE_URL: &str = "https://releases.tynkerbase.dev/agent";

pub const VALID_SOURCE_KINDS: &[&str] = &["http", "local"];

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `/etc/tynkerbase/deploy.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeployConfig {
    /// Directory holding the committed release and staging area.
    pub install_root: PathBuf,
    /// Stable entry point symlink.
    pub entry_point: PathBuf,
    /// User-owned project workspace.
    pub workspace_root: PathBuf,
    /// Executable path relative to the bundle root.
    pub executable: PathBuf,
    pub source: SourceConfig,
    pub fetch: FetchConfig,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            install_root: PathBuf::from(DEFAULT_INSTALL_ROOT),
            entry_point: PathBuf::from(DEFAULT_ENTRY_POINT),
            workspace_root: PathBuf::from(DEFAULT_WORKSPACE_ROOT),
            executable: PathBuf::from(DEFAULT_EXECUTABLE),
            source: SourceConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

/// Where release bundles come from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SourceConfig {
    /// `http` or `local`.
    pub kind: String,
    /// Base URL (`http`) or directory (`local`).
    pub location: String,
    /// Bundle file name; derived from the host platform when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: "http".to_string(),
            location: DEFAULT_SOURCE_URL.to_string(),
            asset: None,
        }
    }
}

/// Timeout and retry settings for fetches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
        }
    }
}

impl FetchConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

impl DeployConfig {
    /// Advisory lock file guarding transitions of the install root.
    ///
    /// Lives next to the install root so removing the root never races with
    /// another process re-creating the lock.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        let name = self
            .install_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "install".to_string());
        let parent = self.install_root.parent().unwrap_or(Path::new("/"));
        parent.join(format!(".{name}.lock"))
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates path relationships, source kind and fetch bounds.
///
/// # Errors
///
/// Returns the first [`ConfigError`] found.
pub fn validate_config(config: &DeployConfig) -> Result<(), ConfigError> {
    let paths = [
        ("install_root", &config.install_root),
        ("entry_point", &config.entry_point),
        ("workspace_root", &config.workspace_root),
    ];
    for (key, path) in paths {
        if !path.is_absolute() {
            return Err(ConfigError::NotAbsolute {
                key,
                value: path.display().to_string(),
            });
        }
        if path.parent().is_none() {
            return Err(ConfigError::RootPath { key });
        }
    }

    for (inner_key, inner) in paths {
        for (outer_key, outer) in paths {
            if inner_key != outer_key && inner.starts_with(outer) {
                return Err(ConfigError::Nested {
                    inner: inner_key,
                    inner_path: inner.display().to_string(),
                    outer: outer_key,
                    outer_path: outer.display().to_string(),
                });
            }
        }
    }

    validate_executable(&config.executable)?;

    if !VALID_SOURCE_KINDS.contains(&config.source.kind.as_str()) {
        return Err(ConfigError::InvalidValue {
            key: "source.kind",
            value: config.source.kind.clone(),
            valid: VALID_SOURCE_KINDS.join(", "),
        });
    }
    if config.fetch.max_attempts == 0 {
        return Err(ConfigError::InvalidValue {
            key: "fetch.max_attempts",
            value: "0".to_string(),
            valid: "1 or more".to_string(),
        });
    }
    if config.fetch.timeout_secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: "fetch.timeout_secs",
            value: "0".to_string(),
            valid: "1 or more".to_string(),
        });
    }
    Ok(())
}

fn validate_executable(executable: &Path) -> Result<(), ConfigError> {
    let valid = !executable.as_os_str().is_empty()
        && executable
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidExecutable(
            executable.display().to_string(),
        ))
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
