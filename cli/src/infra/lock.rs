//! Infrastructure implementation of the `TransitionLock` port.
//!
//! An OS advisory lock (`fd-lock`) on a file next to the install root. The
//! file is opened lazily so read-only commands never create it.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fd_lock::{RwLock, RwLockWriteGuard};

use crate::application::ports::TransitionLock;
use crate::domain::DeployError;

/// Exclusive lock guarding every transition of one install root.
pub struct InstallLock {
    path: PathBuf,
    file: Option<RwLock<File>>,
}

impl InstallLock {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }
}

fn open_lock_file(path: &Path) -> Result<File, DeployError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DeployError::io("creating", parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| DeployError::io("opening lock file", path, e))
}

impl TransitionLock for InstallLock {
    type Guard<'a> = RwLockWriteGuard<'a, File>;

    fn path(&self) -> &Path {
        &self.path
    }

    fn try_acquire(&mut self) -> Result<Self::Guard<'_>, DeployError> {
        let file = match self.file.take() {
            Some(file) => file,
            None => RwLock::new(open_lock_file(&self.path)?),
        };
        let lock = self.file.insert(file);
        match lock.try_write() {
            Ok(guard) => {
                tracing::debug!(path = %self.path.display(), "install lock acquired");
                Ok(guard)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Err(DeployError::LockContention {
                path: self.path.clone(),
            }),
            Err(e) => Err(DeployError::io("locking", &self.path, e)),
        }
    }
}
