//! Single-instance lock

use crate::errors::{DaemonError, Result};
use log::{debug, info, warn};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const LOCK_FILE_NAME: &str = "fan-curve-daemon.lock";

/// Process-wide advisory lock guarding against a second daemon instance
pub trait InstanceLock {
    fn acquire(&mut self) -> Result<()>;

    fn release(&mut self) -> Result<()>;
}

/// Lock file holding the PID of the running daemon
#[derive(Debug)]
pub struct LockFile {
    path: PathBuf,
    held: bool,
}

impl LockFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            held: false,
        }
    }

    /// Lock file in the system temporary directory
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir().join(LOCK_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// PID recorded by whoever holds the lock, if readable
    pub fn owner_pid(&self) -> Option<u32> {
        fs::read_to_string(&self.path).ok()?.trim().parse().ok()
    }

    /// Delete a lock left behind by a daemon that did not exit cleanly
    pub fn remove_stale(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed lock file {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl InstanceLock for LockFile {
    fn acquire(&mut self) -> Result<()> {
        if self.held {
            return Ok(());
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(DaemonError::LockHeld(self.path.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        self.held = true;
        debug!("Acquired lock {}", self.path.display());
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        if !self.held {
            return Ok(());
        }
        self.held = false;
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Cannot remove lock file {}: {}", self.path.display(), e);
            return Err(e.into());
        }
        debug!("Released lock {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_in(dir: &tempfile::TempDir) -> LockFile {
        LockFile::new(dir.path().join(LOCK_FILE_NAME))
    }

    #[test]
    fn test_acquire_writes_pid() {
        let dir = tempfile::tempdir().unwrap();
        let mut lock = lock_in(&dir);

        lock.acquire().unwrap();

        assert!(lock.is_held());
        assert_eq!(lock.owner_pid(), Some(std::process::id()));
    }

    #[test]
    fn test_second_instance_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = lock_in(&dir);
        let mut second = lock_in(&dir);

        first.acquire().unwrap();

        assert!(matches!(second.acquire(), Err(DaemonError::LockHeld(_))));
        assert!(!second.is_held());
    }

    #[test]
    fn test_release_allows_reacquire() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = lock_in(&dir);
        first.acquire().unwrap();
        first.release().unwrap();
        assert!(!first.exists());

        let mut second = lock_in(&dir);
        second.acquire().unwrap();
        assert!(second.is_held());
    }

    #[test]
    fn test_release_without_acquire_keeps_foreign_lock() {
        let dir = tempfile::tempdir().unwrap();
        let mut owner = lock_in(&dir);
        owner.acquire().unwrap();

        let mut other = lock_in(&dir);
        other.release().unwrap();

        assert!(owner.exists());
    }

    #[test]
    fn test_remove_stale() {
        let dir = tempfile::tempdir().unwrap();
        let lock = lock_in(&dir);
        fs::write(lock.path(), "12345\n").unwrap();
        assert_eq!(lock.owner_pid(), Some(12345));

        lock.remove_stale().unwrap();
        assert!(!lock.exists());
        // Nothing to remove is fine
        lock.remove_stale().unwrap();
    }
}
