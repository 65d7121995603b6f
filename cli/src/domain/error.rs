//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::domain::state::{Checkpoint, DeploymentState};

// ── Exit codes ────────────────────────────────────────────────────────────────

/// Operation succeeded.
pub const EXIT_OK: i32 = 0;
/// Recoverable failure, state unchanged.
pub const EXIT_RECOVERABLE: i32 = 1;
/// Left in `FailedPartial`, run `tyb-deploy repair`.
pub const EXIT_REPAIR_NEEDED: i32 = 2;
/// Invalid invocation: bad arguments, bad config, missing confirmation.
pub const EXIT_INVALID_INVOCATION: i32 = 3;

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to the deployment configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be an absolute path, got '{value}'")]
    NotAbsolute { key: &'static str, value: String },

    #[error("{key} must not be the filesystem root")]
    RootPath { key: &'static str },

    #[error("{inner} ({inner_path}) must not live inside {outer} ({outer_path})")]
    Nested {
        inner: &'static str,
        inner_path: String,
        outer: &'static str,
        outer_path: String,
    },

    #[error("executable must be a relative path inside the bundle without '..', got '{0}'")]
    InvalidExecutable(String),

    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: &'static str,
        value: String,
        valid: String,
    },

    #[error("cannot read config {path}: {message}")]
    Unreadable { path: String, message: String },
}

// ── Deployment errors ─────────────────────────────────────────────────────────

/// Every failure a deployment transition can produce.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("fetch failed: {0:#}")]
    Fetch(anyhow::Error),

    #[error("integrity check failed: expected checksum {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("integrity check failed: {0}")]
    Integrity(String),

    #[error("cannot update entry point {}: {source}", path.display())]
    Link {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("refusing to delete {} without confirmation (pass --yes to confirm)", path.display())]
    ConfirmationRequired { path: PathBuf },

    #[error("permission denied on {}: {source}", path.display())]
    Permission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fetch timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("another deployment operation holds the lock {}", path.display())]
    LockContention { path: PathBuf },

    #[error("interrupted at {0}")]
    Cancelled(Checkpoint),

    #[error("the agent is not installed. Run 'tyb-deploy install' first.")]
    NotInstalled,

    #[error("the installation is partially applied. Run 'tyb-deploy repair' first.")]
    RepairRequired,

    #[error("refusing to downgrade from {current} to {requested} (pass --allow-downgrade)")]
    Downgrade { current: String, requested: String },

    #[error("invalid version '{0}': use letters, digits, '.', '_', '+' or '-' (max 64 chars)")]
    InvalidVersion(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl DeployError {
    /// Wrap an I/O error, mapping `PermissionDenied` to [`DeployError::Permission`].
    #[must_use]
    pub fn io(context: impl Into<String>, path: &std::path::Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            return Self::Permission {
                path: path.to_path_buf(),
                source,
            };
        }
        Self::Io {
            context: format!("{} {}", context.into(), path.display()),
            source,
        }
    }

    /// Whether the orchestrating layer should retry the operation with backoff.
    ///
    /// Only network-facing failures qualify; integrity, link and confirmation
    /// failures describe conditions a retry cannot fix.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Timeout(_))
    }

    /// Whether the error means the request itself was not acceptable.
    #[must_use]
    pub fn is_invalid_invocation(&self) -> bool {
        matches!(
            self,
            Self::ConfirmationRequired { .. }
                | Self::NotInstalled
                | Self::RepairRequired
                | Self::Downgrade { .. }
                | Self::InvalidVersion(_)
                | Self::Config(_)
        )
    }

    /// Stable snake_case code used in JSON error output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fetch(_) => "fetch_error",
            Self::ChecksumMismatch { .. } | Self::Integrity(_) => "integrity_error",
            Self::Link { .. } => "link_error",
            Self::ConfirmationRequired { .. } => "confirmation_required",
            Self::Permission { .. } => "permission_error",
            Self::Timeout(_) => "timeout_error",
            Self::LockContention { .. } => "lock_contention",
            Self::Cancelled(_) => "cancelled",
            Self::NotInstalled => "not_installed",
            Self::RepairRequired => "repair_required",
            Self::Downgrade { .. } => "downgrade_refused",
            Self::InvalidVersion(_) => "invalid_version",
            Self::Config(_) => "invalid_config",
            Self::Io { .. } => "io_error",
        }
    }
}

/// A failed transition together with the state the host was left in.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct DeployFailure {
    /// The underlying failure.
    #[source]
    pub error: DeployError,
    /// State observed after the failure.
    pub state: DeploymentState,
}

impl DeployFailure {
    /// Process exit code for this failure.
    ///
    /// `FailedPartial` wins over every other classification because the
    /// operator must repair before anything else is safe.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.state == DeploymentState::FailedPartial {
            EXIT_REPAIR_NEEDED
        } else if self.error.is_invalid_invocation() {
            EXIT_INVALID_INVOCATION
        } else {
            EXIT_RECOVERABLE
        }
    }

    /// One-line hint telling the operator whether re-running is safe.
    #[must_use]
    pub fn hint(&self) -> &'static str {
        match self.state {
            DeploymentState::FailedPartial => "Run 'tyb-deploy repair' to finish the transition.",
            DeploymentState::Staged => "A stale staging directory remains; re-running is safe.",
            DeploymentState::Installed | DeploymentState::Absent => {
                "Nothing was changed; re-running is safe."
            }
        }
    }
}
