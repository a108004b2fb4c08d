//! Page store statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters kept by every page store.
///
/// All fields are atomic for lock-free, thread-safe updates.
///
/// # Memory Ordering
/// We use `Ordering::Relaxed` for all operations because:
/// - We only need atomicity (no partial updates)
/// - Counters are independent of each other
///
/// # Example
/// ```
/// use blinkdex::storage::PageStoreStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = PageStoreStats::new();
/// stats.pages_read.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().pages_read, 1);
/// ```
#[derive(Debug, Default)]
pub struct PageStoreStats {
    /// Pages handed out by `allocate_page`.
    pub pages_allocated: AtomicU64,

    /// Pages returned through `deallocate_page`.
    pub pages_deallocated: AtomicU64,

    /// Successful page loads.
    pub pages_read: AtomicU64,

    /// Page saves.
    pub pages_written: AtomicU64,

    /// Loads that gave up waiting for a page lock.
    pub lock_timeouts: AtomicU64,
}

impl PageStoreStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of pages currently allocated and not yet freed.
    pub fn live_pages(&self) -> u64 {
        self.snapshot().live_pages()
    }

    /// Get a non-atomic copy for display/logging.
    pub fn snapshot(&self) -> StoreStatsSnapshot {
        StoreStatsSnapshot {
            pages_allocated: self.pages_allocated.load(Ordering::Relaxed),
            pages_deallocated: self.pages_deallocated.load(Ordering::Relaxed),
            pages_read: self.pages_read.load(Ordering::Relaxed),
            pages_written: self.pages_written.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.pages_allocated.store(0, Ordering::Relaxed);
        self.pages_deallocated.store(0, Ordering::Relaxed);
        self.pages_read.store(0, Ordering::Relaxed);
        self.pages_written.store(0, Ordering::Relaxed);
        self.lock_timeouts.store(0, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of [`PageStoreStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStatsSnapshot {
    pub pages_allocated: u64,
    pub pages_deallocated: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub lock_timeouts: u64,
}

impl StoreStatsSnapshot {
    pub fn live_pages(&self) -> u64 {
        self.pages_allocated.saturating_sub(self.pages_deallocated)
    }
}

impl fmt::Display for StoreStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ allocated: {}, freed: {}, reads: {}, writes: {}, lock_timeouts: {} }}",
            self.pages_allocated,
            self.pages_deallocated,
            self.pages_read,
            self.pages_written,
            self.lock_timeouts
        )
    }
}
