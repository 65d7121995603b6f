//! Infrastructure implementation of the `ArtifactRepository` port.
//!
//! Layout under the install root:
//!
//! ```text
//! current -> releases/<version>
//! releases/<version>/.artifact.json
//! releases/<version>/<executable>
//! .staging-XXXXXX/bundle.tar.gz
//! .staging-XXXXXX/tree/
//! ```
//!
//! A release directory is fully unpacked, flushed to disk and carries its
//! manifest before it is renamed into `releases/`, and `current` is only ever
//! replaced by a rename, so `current` always names a complete release or
//! nothing. The manifest is written last: a release without a valid one is
//! treated as unpublished and replaced by the next commit.

use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use chrono::Utc;
use flate2::read::GzDecoder;
use tracing::{debug, info, warn};

use crate::application::ports::{ArtifactRepository, SafePoints, SourceProvider};
use crate::domain::artifact::{MANIFEST_FILE, checksums_match};
use crate::domain::{
    ArtifactManifest, Checkpoint, DeployError, InstalledArtifact, StagedArtifact,
    validate_version,
};
use crate::infra::fs::{remove_path, replace_symlink, sha256_file, sync_dir, sync_tree};

const CURRENT_LINK: &str = "current";
const RELEASES_DIR: &str = "releases";
const STAGING_PREFIX: &str = ".staging-";
const ARCHIVE_FILE: &str = "bundle.tar.gz";
const TREE_DIR: &str = "tree";

/// Versioned artifact store rooted at the configured install root.
pub struct ArtifactStore {
    root: PathBuf,
    executable: PathBuf,
}

impl ArtifactStore {
    /// `executable` is the agent binary path relative to the bundle root.
    #[must_use]
    pub fn new(root: PathBuf, executable: PathBuf) -> Self {
        Self { root, executable }
    }

    fn releases_dir(&self) -> PathBuf {
        self.root.join(RELEASES_DIR)
    }

    fn current_link(&self) -> PathBuf {
        self.root.join(CURRENT_LINK)
    }

    /// Release directory `current` points at, if the link exists.
    fn current_release(&self) -> Result<Option<PathBuf>, DeployError> {
        let link = self.current_link();
        match std::fs::read_link(&link) {
            Ok(target) => Ok(Some(self.root.join(target))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            // Not a symlink at all: treat as no committed release.
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => Ok(None),
            Err(e) => Err(DeployError::io("reading", &link, e)),
        }
    }

    fn staging_dirs(&self) -> Result<Vec<PathBuf>, DeployError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DeployError::io("listing", &self.root, e)),
        };
        let mut dirs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DeployError::io("listing", &self.root, e))?;
            if entry
                .file_name()
                .to_string_lossy()
                .starts_with(STAGING_PREFIX)
            {
                dirs.push(entry.path());
            }
        }
        Ok(dirs)
    }

    /// Checksum, unpack, manifest, publish. Staging cleanup is the caller's job.
    fn publish(
        &self,
        staged: &StagedArtifact,
        safe_points: &impl SafePoints,
    ) -> Result<InstalledArtifact, DeployError> {
        validate_version(&staged.version)?;

        let actual = sha256_file(&staged.archive)?;
        if !checksums_match(&staged.expected_checksum, &actual) {
            return Err(DeployError::ChecksumMismatch {
                expected: staged.expected_checksum.trim().to_ascii_lowercase(),
                actual,
            });
        }
        debug!(version = %staged.version, checksum = %actual, "checksum verified");
        safe_points.reached(Checkpoint::Validated)?;

        let tree = staged.dir.join(TREE_DIR);
        std::fs::create_dir(&tree).map_err(|e| DeployError::io("creating", &tree, e))?;
        unpack_archive(&staged.archive, &tree)?;

        let executable = tree.join(&self.executable);
        if !executable.is_file() {
            return Err(DeployError::Integrity(format!(
                "bundle {} does not contain {}",
                staged.version,
                self.executable.display()
            )));
        }

        sync_tree(&tree).map_err(|e| DeployError::io("syncing", &tree, e))?;
        let manifest = ArtifactManifest {
            version: staged.version.clone(),
            checksum: actual,
            executable: self.executable.clone(),
            installed_at: Utc::now(),
        };
        write_manifest(&tree, &manifest)?;
        sync_dir(&tree).map_err(|e| DeployError::io("syncing", &tree, e))?;
        safe_points.reached(Checkpoint::Unpacked)?;

        let releases = self.releases_dir();
        std::fs::create_dir_all(&releases)
            .map_err(|e| DeployError::io("creating", &releases, e))?;
        let dest = releases.join(&staged.version);
        if std::fs::symlink_metadata(&dest).is_ok() {
            self.discard_release(&dest, &staged.version)?;
        }
        std::fs::rename(&tree, &dest).map_err(|e| DeployError::io("publishing", &dest, e))?;
        sync_dir(&releases).map_err(|e| DeployError::io("syncing", &releases, e))?;
        safe_points.reached(Checkpoint::ReleaseMoved)?;

        let link = self.current_link();
        replace_symlink(&link, &Path::new(RELEASES_DIR).join(&staged.version))
            .map_err(|e| DeployError::io("switching", &link, e))?;

        Ok(manifest.into_installed(dest))
    }

    /// Make way for a fresh copy of `version` at `dest`.
    ///
    /// A directory that is not the current release was left behind by a run
    /// interrupted before `current` was swapped. The current release is only
    /// replaced when its manifest is unreadable; a valid one is never
    /// overwritten in place.
    fn discard_release(&self, dest: &Path, version: &str) -> Result<(), DeployError> {
        if self.current_release()?.as_deref() == Some(dest) {
            if read_manifest(dest).is_ok() {
                return Err(DeployError::Integrity(format!(
                    "release {version} is already the current release"
                )));
            }
            warn!(path = %dest.display(), "replacing current release with a damaged manifest");
            let link = self.current_link();
            remove_path(&link).map_err(|e| DeployError::io("removing", &link, e))?;
            sync_dir(&self.root).map_err(|e| DeployError::io("syncing", &self.root, e))?;
        } else {
            warn!(path = %dest.display(), "removing unpublished release");
        }
        remove_path(dest).map_err(|e| DeployError::io("removing", dest, e))?;
        Ok(())
    }
}

impl ArtifactRepository for ArtifactStore {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn fetch_and_stage(
        &self,
        provider: &impl SourceProvider,
        version: &str,
    ) -> Result<StagedArtifact, DeployError> {
        validate_version(version)?;

        // Removed on drop, which covers both fetch errors and a timed-out future.
        let root = self.root.clone();
        let staging = tokio::task::spawn_blocking(move || create_staging(&root))
            .await
            .map_err(|e| {
                DeployError::io("creating staging directory in", &self.root, io::Error::other(e))
            })??;
        let archive = staging.path().join(ARCHIVE_FILE);

        let bundle = provider.fetch(version, &archive).await?;
        if bundle.version != version {
            return Err(DeployError::Fetch(anyhow::anyhow!(
                "source delivered version {} instead of {version}",
                bundle.version
            )));
        }

        let dir = staging.keep();
        debug!(dir = %dir.display(), %version, "bundle staged");
        Ok(StagedArtifact {
            archive: dir.join(ARCHIVE_FILE),
            dir,
            version: bundle.version,
            expected_checksum: bundle.expected_checksum,
        })
    }

    fn commit(
        &self,
        staged: StagedArtifact,
        safe_points: &impl SafePoints,
    ) -> Result<InstalledArtifact, DeployError> {
        let result = self.publish(&staged, safe_points);
        if let Err(e) = remove_path(&staged.dir) {
            warn!(dir = %staged.dir.display(), "could not remove staging directory: {e}");
        }
        if let Ok(artifact) = &result {
            info!(version = %artifact.version, path = %artifact.install_path.display(), "release committed");
        }
        result
    }

    fn current(&self) -> Result<Option<InstalledArtifact>, DeployError> {
        let Some(release) = self.current_release()? else {
            return Ok(None);
        };
        match read_manifest(&release) {
            Ok(manifest) => Ok(Some(manifest.into_installed(release))),
            Err(e) => {
                warn!(release = %release.display(), "ignoring release without a valid manifest: {e}");
                Ok(None)
            }
        }
    }

    fn has_staging(&self) -> Result<bool, DeployError> {
        Ok(!self.staging_dirs()?.is_empty())
    }

    fn clear_staging(&self) -> Result<(), DeployError> {
        for dir in self.staging_dirs()? {
            debug!(dir = %dir.display(), "removing staging directory");
            remove_path(&dir).map_err(|e| DeployError::io("removing", &dir, e))?;
        }
        Ok(())
    }

    fn prune(&self) -> Result<(), DeployError> {
        let releases = self.releases_dir();
        let entries = match std::fs::read_dir(&releases) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(DeployError::io("listing", &releases, e)),
        };
        let current = self.current_release()?;
        for entry in entries {
            let path = entry
                .map_err(|e| DeployError::io("listing", &releases, e))?
                .path();
            if current.as_deref() == Some(path.as_path()) {
                continue;
            }
            debug!(path = %path.display(), "pruning release");
            remove_path(&path).map_err(|e| DeployError::io("removing", &path, e))?;
        }
        Ok(())
    }

    fn remove(&self) -> Result<(), DeployError> {
        let link = self.current_link();
        remove_path(&link).map_err(|e| DeployError::io("removing", &link, e))?;
        if remove_path(&self.root).map_err(|e| DeployError::io("removing", &self.root, e))? {
            info!(root = %self.root.display(), "install root removed");
        }
        Ok(())
    }
}

fn create_staging(root: &Path) -> Result<tempfile::TempDir, DeployError> {
    std::fs::create_dir_all(root).map_err(|e| DeployError::io("creating", root, e))?;
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(root)
        .map_err(|e| DeployError::io("creating staging directory in", root, e))
}

fn unpack_archive(archive: &Path, tree: &Path) -> Result<(), DeployError> {
    let corrupt = |e: io::Error| DeployError::Integrity(format!("corrupt bundle archive: {e}"));

    let file = std::fs::File::open(archive).map_err(|e| DeployError::io("opening", archive, e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    for entry in tar.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        if !entry.unpack_in(tree).map_err(corrupt)? {
            let name = entry
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            return Err(DeployError::Integrity(format!(
                "bundle entry '{name}' escapes the bundle root"
            )));
        }
    }
    Ok(())
}

fn write_manifest(dir: &Path, manifest: &ArtifactManifest) -> Result<(), DeployError> {
    let path = dir.join(MANIFEST_FILE);
    let content = serde_json::to_string_pretty(manifest)
        .map_err(|e| DeployError::io("serializing", &path, io::Error::other(e)))?;
    let mut file =
        std::fs::File::create(&path).map_err(|e| DeployError::io("creating", &path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| DeployError::io("writing", &path, e))?;
    file.sync_all()
        .map_err(|e| DeployError::io("syncing", &path, e))
}

fn read_manifest(release: &Path) -> Result<ArtifactManifest, DeployError> {
    let path = release.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&path).map_err(|e| DeployError::io("reading", &path, e))?;
    serde_json::from_str(&content)
        .map_err(|e| DeployError::Integrity(format!("invalid manifest {}: {e}", path.display())))
}
