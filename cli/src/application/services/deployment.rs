//! Application service - install, upgrade, uninstall and repair transitions.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.
//!
//! Every transition starts by observing the host (artifact store, entry point,
//! staging area), holds the install lock for its whole duration, and reports
//! the observed state alongside any failure.

use std::cmp::Ordering;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::application::ports::{
    ArtifactRepository, EntryPoint, ProgressReporter, ProjectWorkspace, SafePoints,
    SourceProvider, TransitionLock,
};
use crate::domain::artifact::{VersionSelector, compare_versions, validate_version};
use crate::domain::{
    Checkpoint, DeployError, DeployFailure, DeploymentState, InstalledArtifact, LinkStatus,
    RetryPolicy, derive_state,
};

/// Default bound on a single fetch attempt.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(300);

// ── Public types ──────────────────────────────────────────────────────────────

/// Result of `install`.
#[derive(Debug)]
pub enum InstallOutcome {
    /// A fresh artifact was fetched, committed and linked.
    Installed(InstalledArtifact),
    /// The host was already installed; nothing was fetched.
    AlreadyInstalled(InstalledArtifact),
    /// A partial install was completed by re-linking the committed artifact.
    Repaired(InstalledArtifact),
}

impl InstallOutcome {
    /// The artifact the entry point now resolves to.
    #[must_use]
    pub fn artifact(&self) -> &InstalledArtifact {
        match self {
            Self::Installed(a) | Self::AlreadyInstalled(a) | Self::Repaired(a) => a,
        }
    }
}

/// What `upgrade` should fetch.
#[derive(Debug, Clone)]
pub struct UpgradeRequest {
    pub selector: VersionSelector,
    /// Accept a semver-lower version.
    pub allow_downgrade: bool,
}

/// Result of `upgrade`.
#[derive(Debug)]
pub enum UpgradeOutcome {
    Upgraded {
        from: InstalledArtifact,
        to: InstalledArtifact,
    },
    /// The provider offered the installed version.
    UpToDate(InstalledArtifact),
}

/// Whether `uninstall` should also delete the project workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceRemoval {
    Keep,
    Purge { confirmed: bool },
}

/// Result of `uninstall`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallOutcome {
    /// State observed before anything was removed.
    pub previous_state: DeploymentState,
    /// Version that was removed, if one was committed.
    pub removed_version: Option<String>,
    /// Whether a workspace directory was deleted.
    pub workspace_removed: bool,
}

/// Result of `repair`.
#[derive(Debug)]
pub enum RepairOutcome {
    /// Entry point re-pointed at the committed artifact.
    Relinked(InstalledArtifact),
    /// Dangling entry point removed; host is now absent.
    Unlinked,
    /// Stale staging removed.
    ClearedStaging,
    /// Nothing to repair.
    Healthy(DeploymentState),
}

/// Read-only snapshot produced by `status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub state: DeploymentState,
    pub artifact: Option<InstalledArtifact>,
    pub install_root: PathBuf,
    pub entry_point: PathBuf,
    pub link: LinkStatus,
    pub staging_present: bool,
    pub workspace: WorkspaceReport,
}

/// Workspace portion of a [`StatusReport`].
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceReport {
    pub root: PathBuf,
    pub present: bool,
    pub projects: Vec<String>,
}

// ── Manager ───────────────────────────────────────────────────────────────────

/// Orchestrates deployment transitions across the artifact store, entry
/// point and workspace.
pub struct DeploymentManager<A, E, W, L, S> {
    lock: L,
    parts: Components<A, E, W, S>,
}

/// Everything except the lock, so the lock guard can borrow `lock` while
/// the transition borrows the components.
struct Components<A, E, W, S> {
    store: A,
    entry: E,
    workspace: W,
    safe_points: S,
    retry: RetryPolicy,
    fetch_timeout: Duration,
}

/// On-disk facts gathered at the start of a transition.
struct Observation {
    artifact: Option<InstalledArtifact>,
    link: LinkStatus,
    staging: bool,
    state: DeploymentState,
}

impl<A, E, W, L, S> DeploymentManager<A, E, W, L, S>
where
    A: ArtifactRepository,
    E: EntryPoint,
    W: ProjectWorkspace,
    L: TransitionLock,
    S: SafePoints,
{
    /// Build a manager with the default retry policy and fetch timeout.
    pub fn new(store: A, entry: E, workspace: W, lock: L, safe_points: S) -> Self {
        Self {
            lock,
            parts: Components {
                store,
                entry,
                workspace,
                safe_points,
                retry: RetryPolicy::default(),
                fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            },
        }
    }

    /// Replace the retry policy for fetches.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.parts.retry = retry;
        self
    }

    /// Replace the per-attempt fetch timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.parts.fetch_timeout = timeout;
        self
    }

    /// Observe the host without taking the lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the store, entry point or workspace cannot be read.
    pub fn status(&self) -> Result<StatusReport, DeployError> {
        self.parts.status()
    }

    /// Absent → Installed. Completes a partial install instead of re-fetching.
    ///
    /// # Errors
    ///
    /// Returns a [`DeployFailure`] carrying the state the host was left in.
    pub async fn install(
        &mut self,
        provider: &impl SourceProvider,
        selector: &VersionSelector,
        reporter: &impl ProgressReporter,
    ) -> Result<InstallOutcome, DeployFailure> {
        let parts = &self.parts;
        let _guard = self.lock.try_acquire().map_err(|e| parts.failure(e))?;
        parts
            .install(provider, selector, reporter)
            .await
            .map_err(|e| parts.failure(e))
    }

    /// Installed → Installed at a new version.
    ///
    /// # Errors
    ///
    /// Returns a [`DeployFailure`] carrying the state the host was left in.
    pub async fn upgrade(
        &mut self,
        provider: &impl SourceProvider,
        request: &UpgradeRequest,
        reporter: &impl ProgressReporter,
    ) -> Result<UpgradeOutcome, DeployFailure> {
        let parts = &self.parts;
        let _guard = self.lock.try_acquire().map_err(|e| parts.failure(e))?;
        parts
            .upgrade(provider, request, reporter)
            .await
            .map_err(|e| parts.failure(e))
    }

    /// Any state → Absent, optionally deleting the workspace.
    ///
    /// # Errors
    ///
    /// Returns a [`DeployFailure`] carrying the state the host was left in.
    pub fn uninstall(
        &mut self,
        removal: WorkspaceRemoval,
        reporter: &impl ProgressReporter,
    ) -> Result<UninstallOutcome, DeployFailure> {
        let parts = &self.parts;
        let _guard = self.lock.try_acquire().map_err(|e| parts.failure(e))?;
        parts
            .uninstall(removal, reporter)
            .map_err(|e| parts.failure(e))
    }

    /// FailedPartial → Installed (or Absent when no artifact survived).
    ///
    /// # Errors
    ///
    /// Returns a [`DeployFailure`] carrying the state the host was left in.
    pub fn repair(
        &mut self,
        reporter: &impl ProgressReporter,
    ) -> Result<RepairOutcome, DeployFailure> {
        let parts = &self.parts;
        let _guard = self.lock.try_acquire().map_err(|e| parts.failure(e))?;
        parts.repair(reporter).map_err(|e| parts.failure(e))
    }
}

impl<A, E, W, S> Components<A, E, W, S>
where
    A: ArtifactRepository,
    E: EntryPoint,
    W: ProjectWorkspace,
    S: SafePoints,
{
    fn observe(&self) -> Result<Observation, DeployError> {
        let artifact = self.store.current()?;
        let link = self.entry.resolve()?;
        let staging = self.store.has_staging()?;
        let state = derive_state(artifact.as_ref(), &link, staging);
        debug!(%state, ?link, staging, "observed deployment");
        Ok(Observation {
            artifact,
            link,
            staging,
            state,
        })
    }

    /// Attach the post-failure state to an error.
    ///
    /// If the host cannot even be observed, report `FailedPartial` so the
    /// operator is sent to `repair` rather than told a re-run is safe.
    fn failure(&self, error: DeployError) -> DeployFailure {
        let state = self
            .observe()
            .map_or(DeploymentState::FailedPartial, |o| o.state);
        warn!(%state, code = error.code(), "transition failed: {error}");
        DeployFailure { error, state }
    }

    fn status(&self) -> Result<StatusReport, DeployError> {
        let observed = self.observe()?;
        let present = self.workspace.exists();
        let projects = if present {
            self.workspace.projects()?
        } else {
            Vec::new()
        };
        Ok(StatusReport {
            state: observed.state,
            artifact: observed.artifact,
            install_root: self.store.root().to_path_buf(),
            entry_point: self.entry.path().to_path_buf(),
            link: observed.link,
            staging_present: observed.staging,
            workspace: WorkspaceReport {
                root: self.workspace.root().to_path_buf(),
                present,
                projects,
            },
        })
    }

    async fn install(
        &self,
        provider: &impl SourceProvider,
        selector: &VersionSelector,
        reporter: &impl ProgressReporter,
    ) -> Result<InstallOutcome, DeployError> {
        let observed = self.observe()?;
        match observed.state {
            DeploymentState::Installed => {
                if let Some(artifact) = observed.artifact {
                    warn_if_not_requested(selector, &artifact, reporter);
                    self.tidy(reporter);
                    return Ok(InstallOutcome::AlreadyInstalled(artifact));
                }
            }
            DeploymentState::FailedPartial => {
                if let Some(artifact) = observed.artifact {
                    warn_if_not_requested(selector, &artifact, reporter);
                    reporter.step("Completing interrupted install (re-linking entry point)...");
                    self.link(&artifact, reporter)?;
                    return Ok(InstallOutcome::Repaired(artifact));
                }
                reporter.step("Removing dangling entry point...");
                self.entry.remove()?;
            }
            DeploymentState::Staged => reporter.step("Clearing stale staging directory..."),
            DeploymentState::Absent => {}
        }

        self.store.clear_staging()?;
        let version = self.resolve(provider, selector).await?;
        let artifact = self.stage_and_commit(provider, &version, reporter).await?;
        self.link(&artifact, reporter)?;
        info!(version = %artifact.version, "install complete");
        Ok(InstallOutcome::Installed(artifact))
    }

    async fn upgrade(
        &self,
        provider: &impl SourceProvider,
        request: &UpgradeRequest,
        reporter: &impl ProgressReporter,
    ) -> Result<UpgradeOutcome, DeployError> {
        let observed = self.observe()?;
        let current = match (observed.state, observed.artifact) {
            (DeploymentState::Installed, Some(artifact)) => artifact,
            (DeploymentState::FailedPartial, _) => return Err(DeployError::RepairRequired),
            _ => return Err(DeployError::NotInstalled),
        };

        self.store.clear_staging()?;
        let version = self.resolve(provider, &request.selector).await?;
        if version == current.version {
            self.tidy(reporter);
            return Ok(UpgradeOutcome::UpToDate(current));
        }
        if !request.allow_downgrade
            && compare_versions(&current.version, &version) == Some(Ordering::Less)
        {
            return Err(DeployError::Downgrade {
                current: current.version,
                requested: version,
            });
        }

        let next = self.stage_and_commit(provider, &version, reporter).await?;
        self.link(&next, reporter)?;
        info!(from = %current.version, to = %next.version, "upgrade complete");
        Ok(UpgradeOutcome::Upgraded {
            from: current,
            to: next,
        })
    }

    fn uninstall(
        &self,
        removal: WorkspaceRemoval,
        reporter: &impl ProgressReporter,
    ) -> Result<UninstallOutcome, DeployError> {
        // Reject an unconfirmed purge before touching anything.
        if removal == (WorkspaceRemoval::Purge { confirmed: false }) && self.workspace.exists() {
            return Err(DeployError::ConfirmationRequired {
                path: self.workspace.root().to_path_buf(),
            });
        }

        let observed = self.observe()?;

        if observed.link != LinkStatus::Missing {
            reporter.step("Removing entry point...");
        }
        self.entry.remove()?;
        self.safe_points.reached(Checkpoint::Unlinked)?;

        if self.store.root().exists() {
            reporter.step("Removing agent files...");
        }
        self.store.remove()?;
        self.safe_points.reached(Checkpoint::ArtifactRemoved)?;

        let workspace_removed = match removal {
            WorkspaceRemoval::Keep => false,
            WorkspaceRemoval::Purge { confirmed } => {
                let existed = self.workspace.exists();
                if existed {
                    reporter.step("Removing project workspace...");
                }
                self.workspace.destroy(confirmed)?;
                existed
            }
        };

        info!(previous = %observed.state, workspace_removed, "uninstall complete");
        Ok(UninstallOutcome {
            previous_state: observed.state,
            removed_version: observed.artifact.map(|a| a.version),
            workspace_removed,
        })
    }

    fn repair(&self, reporter: &impl ProgressReporter) -> Result<RepairOutcome, DeployError> {
        let observed = self.observe()?;
        let outcome = match (observed.state, observed.artifact) {
            (DeploymentState::FailedPartial, Some(artifact)) => {
                reporter.step(&format!("Re-linking entry point to {}...", artifact.version));
                self.link(&artifact, reporter)?;
                RepairOutcome::Relinked(artifact)
            }
            (DeploymentState::FailedPartial, None) => {
                reporter.step("Removing dangling entry point...");
                self.entry.remove()?;
                RepairOutcome::Unlinked
            }
            (DeploymentState::Staged, _) => RepairOutcome::ClearedStaging,
            (state, _) => RepairOutcome::Healthy(state),
        };
        self.tidy(reporter);
        Ok(outcome)
    }

    // ── Steps ────────────────────────────────────────────────────────────────

    async fn resolve(
        &self,
        provider: &impl SourceProvider,
        selector: &VersionSelector,
    ) -> Result<String, DeployError> {
        let version = self
            .with_retry("resolve version", move || provider.resolve_version(selector))
            .await?;
        validate_version(&version)?;
        debug!(%version, "resolved version");
        Ok(version)
    }

    async fn stage_and_commit(
        &self,
        provider: &impl SourceProvider,
        version: &str,
        reporter: &impl ProgressReporter,
    ) -> Result<InstalledArtifact, DeployError> {
        reporter.step(&format!("Fetching {version}..."));
        let store = &self.store;
        let staged = self
            .with_retry("fetch bundle", move || store.fetch_and_stage(provider, version))
            .await?;

        if let Err(e) = self.safe_points.reached(Checkpoint::Staged) {
            self.discard_staging();
            return Err(e);
        }

        reporter.step("Verifying checksum...");
        let artifact = self.store.commit(staged, &self.safe_points)?;
        reporter.success(&format!("Committed {}", artifact.version));
        Ok(artifact)
    }

    /// Point the entry point at `artifact` and drop older releases.
    fn link(
        &self,
        artifact: &InstalledArtifact,
        reporter: &impl ProgressReporter,
    ) -> Result<(), DeployError> {
        self.safe_points.reached(Checkpoint::Committed)?;
        self.entry.point_to(&artifact.executable)?;
        reporter.success(&format!(
            "{} → {}",
            self.entry.path().display(),
            artifact.executable.display()
        ));
        self.safe_points.reached(Checkpoint::Linked)?;
        self.tidy(reporter);
        Ok(())
    }

    /// Best-effort removal of staging leftovers and superseded releases.
    fn tidy(&self, reporter: &impl ProgressReporter) {
        if let Err(e) = self.store.clear_staging() {
            reporter.warn(&format!("could not clear staging: {e}"));
        }
        if let Err(e) = self.store.prune() {
            reporter.warn(&format!("could not remove old releases: {e}"));
        }
    }

    fn discard_staging(&self) {
        if let Err(e) = self.store.clear_staging() {
            warn!("could not discard staging: {e}");
        }
    }

    /// Run a fetch-like operation with timeout, cancellation and bounded
    /// exponential backoff on retryable failures.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, DeployError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DeployError>>,
    {
        let mut failures = 0u32;
        loop {
            self.safe_points.reached(Checkpoint::BeforeFetch)?;

            let result = tokio::select! {
                r = tokio::time::timeout(self.fetch_timeout, op()) => {
                    r.unwrap_or_else(|_| Err(DeployError::Timeout(self.fetch_timeout)))
                }
                () = self.safe_points.interrupted() => {
                    Err(DeployError::Cancelled(Checkpoint::BeforeFetch))
                }
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            failures += 1;
            if !self.retry.allows_retry(failures) {
                return Err(error);
            }
            let delay = self.retry.delay_after(failures);
            warn!(what, attempt = failures, ?delay, "retrying after error: {error}");
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.safe_points.interrupted() => {
                    return Err(DeployError::Cancelled(Checkpoint::BeforeFetch));
                }
            }
        }
    }
}

/// `install` never moves an existing install to another version.
fn warn_if_not_requested(
    selector: &VersionSelector,
    artifact: &InstalledArtifact,
    reporter: &impl ProgressReporter,
) {
    if let VersionSelector::Exact(requested) = selector {
        if *requested != artifact.version {
            reporter.warn(&format!(
                "{} is installed, not {requested}; run `tyb-deploy upgrade --version {requested}` to switch",
                artifact.version
            ));
        }
    }
}
