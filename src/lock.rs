//! Cross-process advisory lock guarding regeneration
//!
//! Lock file: `<source>.<arch>.flock`. The holder writes a small JSON record
//! (pid, acquisition time) into it for diagnostics. The lock is released and
//! the file removed when the guard is dropped.
//!
//! Because the holder unlinks the file on release, a waiter can end up
//! holding a lock on an inode that is no longer reachable from the path.
//! Acquisition therefore only succeeds once the locked file is the one
//! currently at the path; otherwise it reopens and tries again.

use crate::error::{GovernorError, GovernorResult};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Diagnostic record stored in the lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockHolder {
    /// Process ID of the lock holder
    pub pid: u32,

    /// When the lock was acquired
    pub acquired_at: DateTime<Utc>,
}

impl LockHolder {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        }
    }
}

/// A held exclusive lock
#[derive(Debug)]
pub struct AdvisoryLock {
    file: File,
    path: PathBuf,
    holder: LockHolder,
}

/// Open the lock file, noting whether this call created it
///
/// Returns `None` when an existing file was unlinked before it could be opened.
fn open_lock_file(path: &Path) -> GovernorResult<Option<(File, bool)>> {
    let open_error = |e| GovernorError::io(format!("creating lock file {}", path.display()), e);
    match OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => return Ok(Some((file, true))),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(open_error(e)),
    }

    match OpenOptions::new().read(true).write(true).open(path) {
        Ok(file) => Ok(Some((file, false))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(open_error(e)),
    }
}

/// Whether `file` is still the file linked at `path`
fn is_linked_at(file: &File, path: &Path) -> GovernorResult<bool> {
    let held = file
        .metadata()
        .map_err(|e| GovernorError::io(format!("reading status of {}", path.display()), e))?;
    match fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(GovernorError::io(
            format!("reading status of {}", path.display()),
            e,
        )),
    }
}

impl AdvisoryLock {
    /// Acquire the lock, blocking while another process holds it
    ///
    /// A lock file this call created is removed again on failure. A file
    /// opened from another process is left alone.
    pub fn acquire(path: &Path) -> GovernorResult<Self> {
        loop {
            let Some((file, created)) = open_lock_file(path)? else {
                continue;
            };

            match Self::lock_file(file, path) {
                Ok(Some(lock)) => return Ok(lock),
                Ok(None) => {
                    debug!("Lock file {} was replaced, retrying", path.display());
                }
                Err(e) => {
                    if created {
                        let _ = fs::remove_file(path);
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Lock `file`, returning `None` if it is no longer the file at `path`
    fn lock_file(mut file: File, path: &Path) -> GovernorResult<Option<Self>> {
        file.lock_exclusive()
            .map_err(|e| GovernorError::io(format!("locking {}", path.display()), e))?;

        if !is_linked_at(&file, path)? {
            return Ok(None);
        }

        let holder = LockHolder::current();
        let json = serde_json::to_string(&holder)?;
        file.set_len(0)
            .and_then(|()| file.write_all(json.as_bytes()))
            .map_err(|e| GovernorError::io(format!("writing lock file {}", path.display()), e))?;

        debug!("Acquired lock {}", path.display());
        Ok(Some(Self {
            file,
            path: path.to_path_buf(),
            holder,
        }))
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Who holds the lock
    pub fn holder(&self) -> &LockHolder {
        &self.holder
    }
}

impl Drop for AdvisoryLock {
    fn drop(&mut self) {
        // Unlink while still holding the lock; waiters notice and reopen.
        let _ = fs::remove_file(&self.path);
        let _ = self.file.unlock();
        debug!("Released lock {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn acquire_writes_holder_and_drop_removes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("base.jar.arm64.flock");

        let lock = AdvisoryLock::acquire(&path).unwrap();
        assert_eq!(lock.holder().pid, std::process::id());

        let content = fs::read_to_string(&path).unwrap();
        let holder: LockHolder = serde_json::from_str(&content).unwrap();
        assert_eq!(holder.pid, std::process::id());

        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn second_handle_cannot_lock_while_held() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("base.jar.x86.flock");

        let _lock = AdvisoryLock::acquire(&path).unwrap();
        let other = File::open(&path).unwrap();
        assert!(other.try_lock_exclusive().is_err());
    }

    #[test]
    fn failure_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("base.jar.x86.flock");

        assert!(AdvisoryLock::acquire(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn waiter_relocks_after_holder_unlinks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("base.jar.x86.flock");

        let first = AdvisoryLock::acquire(&path).unwrap();

        let (tx, rx) = mpsc::channel();
        let waiter_path = path.clone();
        let waiter = thread::spawn(move || {
            let lock = AdvisoryLock::acquire(&waiter_path).unwrap();
            tx.send(()).unwrap();
            lock
        });

        // The waiter is blocked behind the first holder.
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(first);

        let second = waiter.join().unwrap();
        let held = second.file.metadata().unwrap();
        let linked = fs::metadata(&path).unwrap();
        assert_eq!((held.dev(), held.ino()), (linked.dev(), linked.ino()));

        // A newcomer opening the path must contend with the waiter.
        let newcomer = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .unwrap();
        assert!(newcomer.try_lock_exclusive().is_err());

        drop(second);
        assert!(!path.exists());
    }

    #[test]
    fn replaced_file_is_not_reported_as_held() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("base.jar.x86.flock");

        let stale = File::create(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(!is_linked_at(&stale, &path).unwrap());

        File::create(&path).unwrap();
        assert!(!is_linked_at(&stale, &path).unwrap());
    }
}
