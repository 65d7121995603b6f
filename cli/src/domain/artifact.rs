//! Artifact domain types and pure validation functions.
//!
//! This module is intentionally free of I/O, async, and external layer imports.
//! All functions take data in and return data out.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::DeployError;

/// File name of the manifest written into every committed release.
pub const MANIFEST_FILE: &str = ".artifact.json";

#[allow(clippy::expect_used)] // compile-time constant pattern
static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._+-]{0,63}$").expect("valid regex")
});

/// A committed artifact as seen through the `current` link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledArtifact {
    /// Absolute path of the release directory.
    pub install_path: PathBuf,
    /// Opaque version identifier.
    pub version: String,
    /// Lowercase hex SHA-256 of the bundle archive.
    pub checksum: String,
    /// Absolute path of the agent executable inside the release.
    pub executable: PathBuf,
    /// When the release was committed.
    pub installed_at: DateTime<Utc>,
}

/// Manifest persisted as `.artifact.json` inside a release directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: String,
    pub checksum: String,
    /// Executable path relative to the release directory.
    pub executable: PathBuf,
    pub installed_at: DateTime<Utc>,
}

impl ArtifactManifest {
    /// Expand the manifest into an [`InstalledArtifact`] rooted at `install_path`.
    #[must_use]
    pub fn into_installed(self, install_path: PathBuf) -> InstalledArtifact {
        InstalledArtifact {
            executable: install_path.join(&self.executable),
            install_path,
            version: self.version,
            checksum: self.checksum,
            installed_at: self.installed_at,
        }
    }
}

/// A fetched bundle sitting in a staging directory, not yet committed.
#[derive(Debug)]
pub struct StagedArtifact {
    /// Staging directory inside the install root.
    pub dir: PathBuf,
    /// Bundle archive inside `dir`.
    pub archive: PathBuf,
    pub version: String,
    /// Checksum the source provider promised for the archive.
    pub expected_checksum: String,
}

/// Which version a source provider should deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    Latest,
    Exact(String),
}

impl VersionSelector {
    /// Parse a CLI `--version` value; `None` and `"latest"` both select the latest release.
    ///
    /// # Errors
    ///
    /// Returns [`DeployError::InvalidVersion`] if an exact version is malformed.
    pub fn parse(value: Option<&str>) -> Result<Self, DeployError> {
        match value {
            None | Some("latest") => Ok(Self::Latest),
            Some(v) => {
                validate_version(v)?;
                Ok(Self::Exact(v.to_string()))
            }
        }
    }
}

/// Validates a version identifier so it is safe to use as a directory name.
///
/// # Errors
///
/// Returns [`DeployError::InvalidVersion`] if the identifier contains path
/// separators, starts with a dot, or is longer than 64 characters.
pub fn validate_version(version: &str) -> Result<(), DeployError> {
    if VERSION_RE.is_match(version) {
        Ok(())
    } else {
        Err(DeployError::InvalidVersion(version.to_string()))
    }
}

/// Compare two checksums, ignoring case and surrounding whitespace.
#[must_use]
pub fn checksums_match(expected: &str, actual: &str) -> bool {
    let expected = expected.trim();
    !expected.is_empty() && expected.eq_ignore_ascii_case(actual.trim())
}

/// Order two versions when both parse as semver; opaque versions are unordered.
#[must_use]
pub fn compare_versions(current: &str, candidate: &str) -> Option<Ordering> {
    let current = semver::Version::parse(current.trim_start_matches('v')).ok()?;
    let candidate = semver::Version::parse(candidate.trim_start_matches('v')).ok()?;
    Some(candidate.cmp(&current))
}

/// Encode bytes as lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(char::from(HEX[(b >> 4) as usize]));
        out.push(char::from(HEX[(b & 0xf) as usize]));
    }
    out
}
