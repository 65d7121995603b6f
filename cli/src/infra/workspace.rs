//! Infrastructure implementation of the `ProjectWorkspace` port.

use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::application::ports::ProjectWorkspace;
use crate::domain::DeployError;

/// The user-owned project workspace (e.g. `/tynkerbase-projects`).
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ProjectWorkspace for WorkspaceManager {
    fn root(&self) -> &Path {
        &self.root
    }

    fn exists(&self) -> bool {
        std::fs::symlink_metadata(&self.root).is_ok()
    }

    fn destroy(&self, confirmed: bool) -> Result<(), DeployError> {
        if !self.exists() {
            return Ok(());
        }
        if !confirmed {
            return Err(DeployError::ConfirmationRequired {
                path: self.root.clone(),
            });
        }
        crate::infra::fs::remove_path(&self.root)
            .map_err(|e| DeployError::io("removing workspace", &self.root, e))?;
        info!(root = %self.root.display(), "workspace removed");
        Ok(())
    }

    fn projects(&self) -> Result<Vec<String>, DeployError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DeployError::io("listing", &self.root, e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DeployError::io("listing", &self.root, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
