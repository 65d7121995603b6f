//! Infrastructure implementation of the `EntryPoint` port.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::application::ports::EntryPoint;
use crate::domain::{DeployError, LinkStatus};
use crate::infra::fs::{replace_symlink, sweep_temp_links};

/// Manages the stable entry-point symlink (e.g. `/usr/local/bin/tyb_agent`).
pub struct SymlinkManager {
    path: PathBuf,
}

impl SymlinkManager {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn link_error(&self, source: io::Error) -> DeployError {
        DeployError::Link {
            path: self.path.clone(),
            source,
        }
    }
}

impl EntryPoint for SymlinkManager {
    fn path(&self) -> &Path {
        &self.path
    }

    fn point_to(&self, target: &Path) -> Result<(), DeployError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.link_error(e))?;
        }
        replace_symlink(&self.path, target).map_err(|e| self.link_error(e))?;
        debug!(entry = %self.path.display(), target = %target.display(), "entry point updated");
        Ok(())
    }

    fn remove(&self) -> Result<(), DeployError> {
        sweep_temp_links(&self.path).map_err(|e| self.link_error(e))?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(entry = %self.path.display(), "entry point removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.link_error(e)),
        }
    }

    fn resolve(&self) -> Result<LinkStatus, DeployError> {
        match std::fs::symlink_metadata(&self.path) {
            Ok(meta) if meta.file_type().is_symlink() => std::fs::read_link(&self.path)
                .map(LinkStatus::Points)
                .map_err(|e| self.link_error(e)),
            Ok(_) => Ok(LinkStatus::NotALink),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(LinkStatus::Missing),
            Err(e) => Err(self.link_error(e)),
        }
    }
}
