//! Domain layer - pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod artifact;
pub mod config;
pub mod error;
pub mod retry;
pub mod state;

pub use artifact::{
    ArtifactManifest, InstalledArtifact, StagedArtifact, VersionSelector, validate_version,
};
pub use config::{DeployConfig, validate_config};
pub use error::{ConfigError, DeployError, DeployFailure};
pub use retry::RetryPolicy;
pub use state::{Checkpoint, DeploymentState, LinkStatus, derive_state};
