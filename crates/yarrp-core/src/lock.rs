use crate::error::{Error, IoError, IoOperation, Result};
use crate::types::InstanceId;
use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// The directory under `$HOME` holding the instance lock files.
const LOCK_DIR: &str = ".yarrp";

/// An exclusive lock on a scanner instance id.
///
/// Two scanners sharing an instance id would consume each other's replies, so only one may hold
/// the lock at a time.  The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
    _lock: Flock<File>,
}

impl InstanceLock {
    /// Lock `instance` in `dir`, or in `$HOME/.yarrp` if no directory is given.
    pub fn acquire(instance: InstanceId, dir: Option<&Path>) -> Result<Self> {
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => std::env::var_os("HOME")
                .map(|home| PathBuf::from(home).join(LOCK_DIR))
                .ok_or_else(|| Error::BadConfig(String::from("HOME is not set")))?,
        };
        std::fs::create_dir_all(&dir).map_err(|err| IoError::Other(err, IoOperation::LockDir))?;
        let path = dir.join(format!("lock.{}", instance.0));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|err| IoError::Other(err, IoOperation::LockFile))?;
        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(lock) => {
                tracing::debug!(path = %path.display(), "instance locked");
                Ok(Self { path, _lock: lock })
            }
            Err((_, Errno::EWOULDBLOCK)) => Err(Error::InstanceLocked(instance.0)),
            Err((_, errno)) => {
                Err(IoError::Other(std::io::Error::from(errno), IoOperation::LockFile).into())
            }
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
