//! The page store seam between the index core and the storage engine.
//!
//! The index manager never touches files or buffers directly. Everything it
//! needs (allocation, load, save, free, the owning object's data-page chain
//! and the persisted index descriptors) goes through [`PageStore`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::common::{FileGroupId, ObjectId, PageId, Result};
use crate::index::RootIndexInfo;
use crate::storage::page::Page;

/// Lock intent passed with every page load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockIntent {
    /// Read access; compatible with other shared holders.
    Shared,
    /// Write access; compatible with nothing.
    Exclusive,
}

impl LockIntent {
    /// Whether a holder with `self` blocks a request with `requested`.
    #[inline]
    pub fn conflicts_with(self, requested: LockIntent) -> bool {
        !(self == LockIntent::Shared && requested == LockIntent::Shared)
    }
}

/// The party a page lock is held for.
///
/// Locks are reentrant per owner: loading a page again under the same owner
/// never waits on that owner's own hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LockOwner(u64);

impl LockOwner {
    /// A fresh owner, distinct from every other owner in the process.
    pub fn unique() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        LockOwner(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Page allocation and persistence consumed by the index manager.
///
/// Implementations must be safe to share between concurrent tasks. Each
/// call is a suspension point; implementations must not hold a synchronous
/// lock across their own `.await`s.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Allocate a zeroed page in `file_group`.
    async fn allocate_page(&self, file_group: FileGroupId) -> Result<PageId>;

    /// Lock a page for `owner` and load a copy of it.
    ///
    /// Waits at most `timeout` for the lock. The hold outlives the call and
    /// is dropped by [`unlock_page`](PageStore::unlock_page); a second load
    /// by the same owner upgrades the hold rather than waiting on it.
    ///
    /// # Errors
    /// `LockTimeout` when the lock is not granted in time, `PageNotFound`
    /// for unknown or freed pages, `ChecksumMismatch` for corrupt pages.
    async fn load_page(
        &self,
        page_id: PageId,
        owner: LockOwner,
        intent: LockIntent,
        timeout: Duration,
    ) -> Result<Box<Page>>;

    /// Drop `owner`'s hold on a page. Unknown holds are ignored.
    fn unlock_page(&self, page_id: PageId, owner: LockOwner);

    /// Persist a page image.
    async fn save_page(&self, page_id: PageId, page: &Page) -> Result<()>;

    /// Release a page's backing storage.
    async fn deallocate_page(&self, page_id: PageId) -> Result<()>;

    /// Head of the object's data-page chain.
    async fn first_data_page(&self, object_id: ObjectId) -> Result<Option<PageId>>;

    /// Successor of a data page in its object's chain.
    async fn next_data_page(&self, page_id: PageId) -> Result<Option<PageId>>;

    /// Insert or replace a persisted index descriptor.
    async fn save_root_info(&self, info: &RootIndexInfo) -> Result<()>;

    /// All persisted index descriptors of an object.
    async fn load_root_infos(&self, object_id: ObjectId) -> Result<Vec<RootIndexInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_compatibility() {
        use LockIntent::*;
        assert!(!Shared.conflicts_with(Shared));
        assert!(Shared.conflicts_with(Exclusive));
        assert!(Exclusive.conflicts_with(Shared));
        assert!(Exclusive.conflicts_with(Exclusive));
    }

    #[test]
    fn test_lock_owners_are_distinct() {
        let a = LockOwner::unique();
        let b = LockOwner::unique();
        assert_ne!(a, b);
    }
}
