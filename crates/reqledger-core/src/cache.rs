//! Time-bounded snapshot cache for concurrent readers.
//!
//! Readers share the most recent fully-computed snapshot instead of each
//! reloading the ledger. Expiry is checked lazily on access; there is no
//! timer. A snapshot may therefore lag another process's commit by up to the
//! TTL; that bounded staleness is what the caller accepts by reading through
//! the cache.
//! A writer in this process must call [`SnapshotCache::invalidate`] after
//! its commit so its own next read is never stale.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

struct Cached<T> {
    value: Arc<T>,
    computed_at: Instant,
}

/// Lazily-expiring single-slot cache.
pub struct SnapshotCache<T> {
    state: Mutex<Option<Cached<T>>>,
}

impl<T> Default for SnapshotCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SnapshotCache<T> {
    /// Empty cache; the first read computes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    /// Current snapshot, recomputing via `reload` on miss, expiry, or
    /// `force`.
    ///
    /// The internal lock is held across `reload`, so concurrent readers
    /// arriving during a recompute wait for it instead of issuing redundant
    /// reloads. If `reload` fails the previous snapshot (if any) is kept for
    /// the next attempt and the error is returned unchanged.
    ///
    /// # Errors
    ///
    /// Whatever `reload` returns.
    pub fn get<E>(
        &self,
        ttl: Duration,
        force: bool,
        reload: impl FnOnce() -> Result<T, E>,
    ) -> Result<Arc<T>, E> {
        // A poisoned cache only means a reload panicked; rebuild from disk.
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if !force {
            if let Some(cached) = state.as_ref() {
                if cached.computed_at.elapsed() <= ttl {
                    return Ok(Arc::clone(&cached.value));
                }
            }
        }

        let value = Arc::new(reload()?);
        *state = Some(Cached {
            value: Arc::clone(&value),
            computed_at: Instant::now(),
        });
        Ok(value)
    }

    /// Drop the cached snapshot so the next read recomputes.
    pub fn invalidate(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const LONG_TTL: Duration = Duration::from_secs(3600);

    fn counting_reload(counter: &AtomicUsize) -> impl FnOnce() -> Result<usize, Infallible> + '_ {
        move || Ok(counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[test]
    fn first_read_computes_and_later_reads_hit() {
        let cache = SnapshotCache::new();
        let reloads = AtomicUsize::new(0);

        let first = cache
            .get(LONG_TTL, false, counting_reload(&reloads))
            .expect("get");
        let second = cache
            .get(LONG_TTL, false, counting_reload(&reloads))
            .expect("get");

        assert_eq!(*first, 1);
        assert_eq!(*second, 1, "within the TTL the snapshot is shared");
        assert_eq!(reloads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn expired_snapshot_is_recomputed() {
        let cache = SnapshotCache::new();
        let reloads = AtomicUsize::new(0);

        let ttl = Duration::from_millis(1);
        cache
            .get(ttl, false, counting_reload(&reloads))
            .expect("get");
        std::thread::sleep(Duration::from_millis(10));
        let second = cache
            .get(ttl, false, counting_reload(&reloads))
            .expect("get");

        assert_eq!(*second, 2);
        assert_eq!(reloads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn force_bypasses_a_fresh_snapshot() {
        let cache = SnapshotCache::new();
        let reloads = AtomicUsize::new(0);

        cache
            .get(LONG_TTL, false, counting_reload(&reloads))
            .expect("get");
        let forced = cache
            .get(LONG_TTL, true, counting_reload(&reloads))
            .expect("get");

        assert_eq!(*forced, 2);
    }

    #[test]
    fn invalidate_drops_the_snapshot() {
        let cache = SnapshotCache::new();
        let reloads = AtomicUsize::new(0);

        cache
            .get(LONG_TTL, false, counting_reload(&reloads))
            .expect("get");
        cache.invalidate();
        let after = cache
            .get(LONG_TTL, false, counting_reload(&reloads))
            .expect("get");

        assert_eq!(*after, 2);
    }

    #[test]
    fn reload_failure_keeps_the_previous_snapshot() {
        let cache = SnapshotCache::new();

        let seeded: Arc<u32> = cache
            .get(LONG_TTL, false, || Ok::<_, String>(7))
            .expect("seed");
        assert_eq!(*seeded, 7);

        let err = cache
            .get(LONG_TTL, true, || Err::<u32, String>("disk gone".into()))
            .expect_err("reload fails");
        assert_eq!(err, "disk gone");

        // The stale-but-valid snapshot is still served within the TTL.
        let kept = cache
            .get(LONG_TTL, false, || Ok::<_, String>(99))
            .expect("get");
        assert_eq!(*kept, 7);
    }
}
