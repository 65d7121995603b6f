//! Deployment state machine types.
//!
//! The state is never stored; it is derived from what is on disk each time
//! an operation starts so that a crashed run is always observed correctly.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::domain::artifact::InstalledArtifact;

/// Observable deployment state of the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeploymentState {
    /// Nothing installed.
    Absent,
    /// A staging directory exists but nothing was committed.
    Staged,
    /// Artifact committed and entry point resolves to it.
    Installed,
    /// Artifact and entry point disagree; recoverable with `repair`.
    FailedPartial,
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Absent => "Absent",
            Self::Staged => "Staged",
            Self::Installed => "Installed",
            Self::FailedPartial => "FailedPartial",
        };
        f.write_str(s)
    }
}

/// What currently sits at the entry-point path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum LinkStatus {
    /// Nothing at the path.
    Missing,
    /// A symlink with the given (unresolved) target.
    Points(PathBuf),
    /// A regular file or directory that is not a symlink.
    NotALink,
}

/// Safe points between atomic sub-steps where cancellation is honoured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    BeforeFetch,
    Staged,
    Validated,
    Unpacked,
    ReleaseMoved,
    Committed,
    Linked,
    Unlinked,
    ArtifactRemoved,
}

impl Checkpoint {
    /// Every checkpoint, in the order a full install/uninstall cycle reaches them.
    pub const ALL: [Checkpoint; 9] = [
        Checkpoint::BeforeFetch,
        Checkpoint::Staged,
        Checkpoint::Validated,
        Checkpoint::Unpacked,
        Checkpoint::ReleaseMoved,
        Checkpoint::Committed,
        Checkpoint::Linked,
        Checkpoint::Unlinked,
        Checkpoint::ArtifactRemoved,
    ];
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BeforeFetch => "before fetch",
            Self::Staged => "staged",
            Self::Validated => "checksum validated",
            Self::Unpacked => "bundle unpacked",
            Self::ReleaseMoved => "release moved into place",
            Self::Committed => "artifact committed",
            Self::Linked => "entry point linked",
            Self::Unlinked => "entry point removed",
            Self::ArtifactRemoved => "artifact removed",
        };
        f.write_str(s)
    }
}

/// Derive the deployment state from the three observable facts.
#[must_use]
pub fn derive_state(
    artifact: Option<&InstalledArtifact>,
    link: &LinkStatus,
    staging_present: bool,
) -> DeploymentState {
    match (artifact, link) {
        (Some(artifact), LinkStatus::Points(target)) if *target == artifact.executable => {
            DeploymentState::Installed
        }
        (Some(_), _) | (None, LinkStatus::Points(_)) => DeploymentState::FailedPartial,
        (None, _) if staging_present => DeploymentState::Staged,
        (None, _) => DeploymentState::Absent,
    }
}
