//! Per-component file locks
//!
//! Git's on-disk state (index, `HEAD`, ref files, config) is not safe for
//! concurrent mutation. Every reconciliation of a working tree holds an
//! exclusive [`ComponentLock`] so that two processes (or two tasks) syncing
//! the same directory run one after the other.
//!
//! Lock files live next to the working trees rather than inside them, so a
//! lock can be taken before the directory exists (first clone):
//!
//! ```text
//! <work_dir>/dependencies/.locks/<component dir name>.lock
//! ```

use anyhow::{Context, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// An exclusive lock on a component working tree, released on drop.
pub struct ComponentLock {
    file: File,
    path: PathBuf,
}

impl ComponentLock {
    /// Acquires the lock for the working tree at `directory`, waiting for any
    /// other holder to release it.
    ///
    /// Creates the `.locks` directory next to `directory` if needed. Blocking
    /// file locking runs on tokio's blocking pool.
    pub async fn acquire(directory: &Path) -> Result<Self> {
        let lock_path = lock_path(directory)?;
        if let Some(locks_dir) = lock_path.parent() {
            tokio::fs::create_dir_all(locks_dir).await.map_err(|e| {
                if e.kind() == std::io::ErrorKind::PermissionDenied {
                    anyhow::anyhow!(
                        "Permission denied: cannot create locks directory at {}",
                        locks_dir.display()
                    )
                } else {
                    anyhow::anyhow!("Failed to create directory {}: {}", locks_dir.display(), e)
                }
            })?;
        }

        let path = lock_path.clone();
        let file = tokio::task::spawn_blocking(move || -> Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

            file.lock_exclusive()
                .with_context(|| format!("Failed to acquire lock: {}", path.display()))?;

            Ok(file)
        })
        .await
        .context("Failed to spawn blocking task for lock acquisition")??;

        tracing::trace!(target: "commodore::lock", "Acquired {}", lock_path.display());

        Ok(Self {
            file,
            path: lock_path,
        })
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ComponentLock {
    fn drop(&mut self) {
        #[allow(unstable_name_collisions)]
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

fn lock_path(directory: &Path) -> Result<PathBuf> {
    let name = directory
        .file_name()
        .with_context(|| format!("Cannot lock {}: path has no final component", directory.display()))?;
    let parent = directory.parent().unwrap_or_else(|| Path::new(""));

    let mut file_name = name.to_os_string();
    file_name.push(".lock");
    Ok(parent.join(".locks").join(file_name))
}
