//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::Path;

use crate::domain::{
    Checkpoint, DeployError, InstalledArtifact, LinkStatus, StagedArtifact, VersionSelector,
};

// ── Value Types ───────────────────────────────────────────────────────────────

/// What a source provider delivered into the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBundle {
    /// Version actually delivered.
    pub version: String,
    /// Checksum the provider vouches for; verified again at commit.
    pub expected_checksum: String,
}

// ── Source Port ───────────────────────────────────────────────────────────────

/// External collaborator that produces versioned artifact bundles.
#[allow(async_fn_in_trait)]
pub trait SourceProvider {
    /// Turn a selector into a concrete version.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Fetch`] if the provider cannot be reached.
    async fn resolve_version(&self, selector: &VersionSelector) -> Result<String, DeployError>;

    /// Write the bundle archive for `version` to `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Fetch`] on any transport failure.
    async fn fetch(&self, version: &str, dest: &Path) -> Result<FetchedBundle, DeployError>;
}

// ── Deployment Component Ports ────────────────────────────────────────────────

/// Owns the versioned artifact on disk.
#[allow(async_fn_in_trait)]
pub trait ArtifactRepository {
    /// Install root directory.
    fn root(&self) -> &Path;

    /// Fetch `version` into a fresh staging directory. The directory is
    /// removed if the fetch fails or the returned future is dropped.
    async fn fetch_and_stage(
        &self,
        provider: &impl SourceProvider,
        version: &str,
    ) -> Result<StagedArtifact, DeployError>;

    /// Validate and atomically publish a staged artifact.
    ///
    /// On error the staging directory is discarded and the previously
    /// committed artifact is untouched.
    fn commit(
        &self,
        staged: StagedArtifact,
        safe_points: &impl SafePoints,
    ) -> Result<InstalledArtifact, DeployError>;

    /// The committed artifact, if any.
    fn current(&self) -> Result<Option<InstalledArtifact>, DeployError>;

    /// Whether any staging directory exists.
    fn has_staging(&self) -> Result<bool, DeployError>;

    /// Remove every staging directory.
    fn clear_staging(&self) -> Result<(), DeployError>;

    /// Remove release directories other than the current one.
    fn prune(&self) -> Result<(), DeployError>;

    /// Remove the whole install root. Idempotent.
    fn remove(&self) -> Result<(), DeployError>;
}

/// The stable entry point callers invoke.
pub trait EntryPoint {
    /// Location of the entry point.
    fn path(&self) -> &Path;
    /// Create or atomically replace the entry point so it targets `target`.
    fn point_to(&self, target: &Path) -> Result<(), DeployError>;
    /// Remove the entry point. Idempotent.
    fn remove(&self) -> Result<(), DeployError>;
    /// Inspect the entry point without following it.
    fn resolve(&self) -> Result<LinkStatus, DeployError>;
}

/// User-owned project workspace.
pub trait ProjectWorkspace {
    /// Workspace root directory.
    fn root(&self) -> &Path;
    /// Whether the workspace directory exists.
    fn exists(&self) -> bool;
    /// Delete the workspace. Requires `confirmed`; absent workspaces succeed.
    fn destroy(&self, confirmed: bool) -> Result<(), DeployError>;
    /// Names of the project directories in the workspace.
    fn projects(&self) -> Result<Vec<String>, DeployError>;
}

/// Exclusive lock scoped to the install path.
pub trait TransitionLock {
    /// Held for the duration of a transition; releases on drop.
    type Guard<'a>
    where
        Self: 'a;

    /// Location of the lock, for error messages.
    fn path(&self) -> &Path;

    /// Take the lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::LockContention`] if another operation holds it.
    fn try_acquire(&mut self) -> Result<Self::Guard<'_>, DeployError>;
}

// ── Cancellation Port ─────────────────────────────────────────────────────────

/// Safe points where a transition may be cancelled.
#[allow(async_fn_in_trait)]
pub trait SafePoints {
    /// Called between atomic sub-steps.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::Cancelled`] if the operation must stop here.
    fn reached(&self, point: Checkpoint) -> Result<(), DeployError>;

    /// Resolves once cancellation has been requested; pending forever otherwise.
    async fn interrupted(&self);
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
