//! Process-level mutual exclusion for rebranch commands.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;

use crate::error::RebranchError;

/// File name of the advisory lock inside the git dir.
pub const LOCK_FILE_NAME: &str = "rebranch.lock";

/// An exclusive advisory lock on `<git-dir>/rebranch.lock`, held until
/// dropped.
#[derive(Debug)]
pub struct CommandLock {
    _file: File,
    path: PathBuf,
}

impl CommandLock {
    /// Take the lock without waiting.
    ///
    /// Fails with [`RebranchError::Locked`] if another process holds it.
    pub fn acquire(git_dir: &Path) -> Result<Self, RebranchError> {
        let path = git_dir.join(LOCK_FILE_NAME);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "lock acquired");
                Ok(Self { _file: file, path })
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(RebranchError::Locked { path }),
            Err(e) => Err(e.into()),
        }
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
