//! Scoped temporary workspace for aggregate runs.
//!
//! Git marks object files read-only, which makes a plain recursive delete
//! fail on Windows. Removal therefore goes through [`remove_tree`], which can
//! clear read-only attributes and retry according to a [`ReadOnlyPolicy`].

use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::error::{Error, Result};

/// What to do when a tree cannot be removed on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadOnlyPolicy {
    /// Make every entry writable, then retry once.
    Clear,
    /// Surface the first removal error as is.
    Leave,
}

impl ReadOnlyPolicy {
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            ReadOnlyPolicy::Clear
        } else {
            ReadOnlyPolicy::Leave
        }
    }
}

/// A temporary directory removed on `close()` or, best effort, on drop.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
    policy: ReadOnlyPolicy,
}

impl Workspace {
    pub fn create(prefix: &str, policy: ReadOnlyPolicy) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .map_err(|e| Error::internal_io(e.to_string(), Some("create workspace".to_string())))?;
        let path = dir.path().to_path_buf();

        log_status!("workspace", "Created {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
            policy,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the workspace, reporting any failure the policy cannot handle.
    pub fn close(mut self) -> Result<()> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };
        let result = remove_tree(&self.path, self.policy);
        // TempDir's own cleanup is a no-op once the tree is gone.
        drop(dir);
        result
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.dir.take().is_some() {
            let _ = remove_tree(&self.path, self.policy);
        }
    }
}

/// Recursively delete `path`. A missing path counts as removed.
pub fn remove_tree(path: &Path, policy: ReadOnlyPolicy) -> Result<()> {
    let first = match fs::remove_dir_all(path) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => e,
    };

    if policy == ReadOnlyPolicy::Leave {
        return Err(removal_error(path, first));
    }

    log_status!("workspace", "Clearing read-only attributes under {}", path.display());
    clear_read_only(path)?;

    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(removal_error(path, e)),
    }
}

fn removal_error(path: &Path, e: std::io::Error) -> Error {
    Error::internal_io(
        e.to_string(),
        Some(format!("remove workspace {}", path.display())),
    )
}

/// Make `root` and everything below it writable.
pub fn clear_read_only(root: &Path) -> Result<()> {
    make_writable(root)?;

    let pattern = format!("{}/**/*", Pattern::escape(&root.to_string_lossy()));
    let entries = glob::glob(&pattern).map_err(|e| {
        Error::internal_unexpected(format!("Invalid workspace pattern {}: {}", pattern, e))
    })?;

    for entry in entries.flatten() {
        make_writable(&entry)?;
    }
    Ok(())
}

fn make_writable(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("stat {}", path.display())))
    })?;
    if metadata.file_type().is_symlink() {
        return Ok(());
    }

    let mut permissions = metadata.permissions();
    if !permissions.readonly() {
        return Ok(());
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        permissions.set_mode(permissions.mode() | 0o200);
    }
    #[cfg(not(unix))]
    {
        permissions.set_readonly(false);
    }

    fs::set_permissions(path, permissions).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("clear read-only {}", path.display())))
    })
}
