//! Filesystem primitives shared by the artifact store and the entry point.

use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::domain::DeployError;
use crate::domain::artifact::hex_encode;

/// Compute the SHA256 hex digest of a file.
///
/// Reads the file in 64 KB chunks to avoid loading large files into memory.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> Result<String, DeployError> {
    let mut file =
        std::fs::File::open(path).map_err(|e| DeployError::io("opening", path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 65536];
    loop {
        let n = file
            .read(&mut buf)
            .map_err(|e| DeployError::io("reading", path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

/// Flush directory entries so a preceding rename survives a power loss.
///
/// # Errors
///
/// Returns an error if the directory cannot be opened or synced.
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        std::fs::File::open(dir)?.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

/// Flush every regular file and directory under `root` to stable storage.
///
/// Symlinks are not followed.
///
/// # Errors
///
/// Returns an error if an entry cannot be listed, opened or synced.
pub fn sync_tree(root: &Path) -> io::Result<()> {
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            sync_tree(&entry.path())?;
        } else if file_type.is_file() {
            std::fs::File::open(entry.path())?.sync_all()?;
        }
    }
    sync_dir(root)
}

/// Random suffix for temporary sibling names.
///
/// Uses `RandomState` (`SipHash` with random keys) seeded with a nanosecond
/// timestamp, so concurrent processes never pick the same name.
pub(crate) fn unique_suffix() -> String {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let mut hasher = RandomState::new().build_hasher();
    hasher.write_u128(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0),
    );
    hasher.write_u32(std::process::id());
    format!("{:016x}", hasher.finish())
}

fn temp_prefix(name: &str) -> String {
    format!(".{name}.tmp-")
}

/// Atomically make `link` a symlink to `target`.
///
/// The new link is created under a temporary sibling name and renamed over
/// `link`, so readers see either the old target or the new one. Leftover
/// temporaries from an interrupted run are swept first.
///
/// # Errors
///
/// Returns an error if the link cannot be created or renamed into place.
pub fn replace_symlink(link: &Path, target: &Path) -> io::Result<()> {
    let (parent, name) = split_link_path(link)?;
    sweep_temp_links(link)?;

    let tmp = parent.join(format!("{}{}", temp_prefix(&name), unique_suffix()));
    symlink(target, &tmp)?;
    if let Err(e) = std::fs::rename(&tmp, link) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    sync_dir(parent)
}

/// Remove temporary siblings left behind by an interrupted [`replace_symlink`].
///
/// # Errors
///
/// Returns an error if the parent directory cannot be listed or a leftover
/// cannot be removed.
pub fn sweep_temp_links(link: &Path) -> io::Result<()> {
    let (parent, name) = split_link_path(link)?;
    let prefix = temp_prefix(&name);
    let entries = match std::fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(&prefix) {
            tracing::debug!(path = %entry.path().display(), "removing stale temporary link");
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
    }
    Ok(())
}

/// Remove a file, symlink or directory tree. Returns whether anything was removed.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_path(path: &Path) -> io::Result<bool> {
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if meta.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(true)
}

fn split_link_path(link: &Path) -> io::Result<(&Path, String)> {
    let parent = link.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", link.display()),
        )
    })?;
    let name = link.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no file name", link.display()),
        )
    })?;
    Ok((parent, name.to_string_lossy().into_owned()))
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks require a unix host",
    ))
}
