use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum LockError {
    #[error("issue {0} is already being worked on in another session")]
    AlreadyLocked(u64),
    #[error("lock file error: {0}")]
    Io(#[from] io::Error),
}

/// Exclusive advisory lock on one issue, held for the process lifetime.
///
/// The lock is a kernel flock on `<locks_dir>/<issue>.lock` and is released
/// when the process exits, however it exits, so a crashed session never
/// leaves a stale lock behind.
#[derive(Debug)]
pub(crate) struct IssueLock {
    path: PathBuf,
    _file: File,
}

impl IssueLock {
    pub(crate) fn acquire(locks_dir: &Path, issue: u64) -> Result<Self, LockError> {
        fs::create_dir_all(locks_dir)?;
        let path = locks_dir.join(format!("{}.lock", issue));
        let file = OpenOptions::new().create(true).write(true).open(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { path, _file: file }),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                Err(LockError::AlreadyLocked(issue))
            }
            Err(err) => Err(LockError::Io(err)),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}
