//! Cross-process mutual exclusion over the ledger file.
//!
//! Writers may run in separate worker processes, so in-process mutexes are
//! not enough: the lock is an exclusive OS file lock on a `.lock` marker
//! kept next to the ledger. Acquisition probes non-blocking and polls with
//! jitter until success or timeout; the wait is the only cancellable part of
//! a write, and it is abandoned at the timeout.
//!
//! The lock is released when the guard is dropped: closing the file
//! descriptor releases the OS lock, and an `flock` release synchronizes-with
//! the next successful acquisition.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use super::LedgerError;

/// Poll interval while waiting for the ledger lock.
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum jitter added to each poll (milliseconds), to keep concurrent
/// waiters from probing in lockstep.
pub const LOCK_POLL_JITTER_MS: u64 = 50;

/// Held ledger lock. Dropping the guard releases the lock.
pub struct LockGuard {
    /// The lock file, held open for the lifetime of the guard.
    _lock_file: File,
    /// Lock marker path, for diagnostics.
    path: PathBuf,
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Lock manager for one ledger file.
#[derive(Debug, Clone)]
pub struct LedgerLock {
    path: PathBuf,
}

impl LedgerLock {
    /// Lock manager over the given lock marker path.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// The lock marker path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Try to acquire the lock without blocking.
    ///
    /// Returns `Ok(Some(guard))` on success, `Ok(None)` if another process
    /// currently holds the lock.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] on unexpected filesystem errors.
    pub fn try_acquire(&self) -> Result<Option<LockGuard>, LedgerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::io(format!("creating lock directory {}", parent.display()), e)
            })?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| {
                LedgerError::io(format!("opening lock file {}", self.path.display()), e)
            })?;

        match lock_file.try_lock_exclusive() {
            Ok(()) => Ok(Some(LockGuard {
                _lock_file: lock_file,
                path: self.path.clone(),
            })),
            Err(e) if is_contended(&e) => Ok(None),
            Err(e) => Err(LedgerError::io(
                format!("locking {}", self.path.display()),
                e,
            )),
        }
    }

    /// Acquire the lock, polling with jitter until success or `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::LockTimeout`] if the lock is not acquired
    /// within the bound; callers treat this as retryable, never fatal.
    pub fn acquire(&self, timeout: Duration) -> Result<LockGuard, LedgerError> {
        let start = Instant::now();
        loop {
            if let Some(guard) = self.try_acquire()? {
                return Ok(guard);
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                tracing::debug!(
                    path = %self.path.display(),
                    elapsed_secs = elapsed.as_secs(),
                    "ledger lock wait abandoned at timeout"
                );
                return Err(LedgerError::LockTimeout {
                    elapsed_secs: elapsed.as_secs(),
                });
            }
            let jitter_ms = rand::random::<u64>() % (LOCK_POLL_JITTER_MS + 1);
            std::thread::sleep(LOCK_POLL_INTERVAL + Duration::from_millis(jitter_ms));
        }
    }
}

/// Whether a lock error means "held by someone else" rather than a real
/// failure.
fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn acquire_and_release() {
        let dir = TempDir::new().expect("tempdir");
        let lock = LedgerLock::new(dir.path().join("ledger.lock"));

        let guard = lock.try_acquire().expect("probe").expect("acquire");
        drop(guard);

        // Released on drop: a second acquisition succeeds immediately.
        assert!(lock.try_acquire().expect("probe").is_some());
    }

    #[test]
    fn contended_lock_reports_none() {
        let dir = TempDir::new().expect("tempdir");
        let lock = LedgerLock::new(dir.path().join("ledger.lock"));

        let _held = lock.try_acquire().expect("probe").expect("acquire");
        // A second open file description cannot take the exclusive lock.
        assert!(lock.try_acquire().expect("probe").is_none());
    }

    #[test]
    fn acquire_times_out_when_held() {
        let dir = TempDir::new().expect("tempdir");
        let lock = LedgerLock::new(dir.path().join("ledger.lock"));

        let _held = lock.try_acquire().expect("probe").expect("acquire");
        let err = lock
            .acquire(Duration::from_millis(150))
            .expect_err("must time out");
        assert!(matches!(err, LedgerError::LockTimeout { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn acquire_succeeds_after_release() {
        let dir = TempDir::new().expect("tempdir");
        let lock = LedgerLock::new(dir.path().join("ledger.lock"));

        let guard = lock.try_acquire().expect("probe").expect("acquire");
        let contender = lock.clone();
        let handle = std::thread::spawn(move || contender.acquire(Duration::from_secs(10)));
        std::thread::sleep(Duration::from_millis(50));
        drop(guard);

        handle
            .join()
            .expect("join")
            .expect("contender acquires after release");
    }
}
