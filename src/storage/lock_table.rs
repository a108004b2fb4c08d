//! Page lock bookkeeping shared by the bundled page stores.
//!
//! Every hold belongs to a [`LockOwner`]: an index manager operation, a
//! transaction layer, a checkpoint, a test. A request waits while another
//! owner holds the page in a conflicting mode, until that hold is released
//! or the request's timeout expires. An owner never waits on itself.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::common::{Error, PageId, Result};

use super::page_store::{LockIntent, LockOwner};
use super::stats::PageStoreStats;

/// How often a blocked request re-checks the table.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Debug, Default)]
pub(crate) struct PageLockTable {
    held: Mutex<HashMap<PageId, HashMap<LockOwner, LockIntent>>>,
}

impl PageLockTable {
    /// Grant the lock if no other owner conflicts. A granted exclusive
    /// request upgrades an existing shared hold of the same owner.
    pub(crate) fn try_lock(&self, page_id: PageId, owner: LockOwner, intent: LockIntent) -> bool {
        let mut held = self.held.lock();
        let holders = held.entry(page_id).or_default();
        let blocked = holders
            .iter()
            .any(|(holder, mode)| *holder != owner && mode.conflicts_with(intent));
        if blocked {
            return false;
        }
        let mode = holders.entry(owner).or_insert(intent);
        if intent == LockIntent::Exclusive {
            *mode = LockIntent::Exclusive;
        }
        true
    }

    /// Wait until `owner` can hold `page_id` with `intent`, then hold it.
    pub(crate) async fn lock(
        &self,
        page_id: PageId,
        owner: LockOwner,
        intent: LockIntent,
        timeout: Duration,
        stats: &PageStoreStats,
    ) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while !self.try_lock(page_id, owner, intent) {
            if Instant::now() >= deadline {
                PageStoreStats::bump(&stats.lock_timeouts);
                tracing::warn!(target: "blinkdex::store", %page_id, ?intent, ?timeout, "page lock timed out");
                return Err(Error::LockTimeout { page_id, timeout });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        Ok(())
    }

    /// Drop `owner`'s hold on the page, whatever its mode.
    pub(crate) fn unlock(&self, page_id: PageId, owner: LockOwner) {
        let mut held = self.held.lock();
        if let Some(holders) = held.get_mut(&page_id) {
            holders.remove(&owner);
            if holders.is_empty() {
                held.remove(&page_id);
            }
        }
    }

    /// The mode `owner` currently holds the page in.
    #[cfg(test)]
    pub(crate) fn mode(&self, page_id: PageId, owner: LockOwner) -> Option<LockIntent> {
        self.held
            .lock()
            .get(&page_id)
            .and_then(|holders| holders.get(&owner).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_shared_holds_admit_shared_requests() {
        let table = PageLockTable::default();
        let stats = PageStoreStats::new();
        let (a, b) = (LockOwner::unique(), LockOwner::unique());
        assert!(table.try_lock(PageId::new(1), a, LockIntent::Shared));

        table
            .lock(PageId::new(1), b, LockIntent::Shared, Duration::ZERO, &stats)
            .await
            .unwrap();
        let err = table
            .lock(PageId::new(1), b, LockIntent::Exclusive, Duration::from_millis(5), &stats)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LockTimeout { page_id: PageId(1), .. }));
        assert_eq!(stats.snapshot().lock_timeouts, 1);
        assert_eq!(table.mode(PageId::new(1), b), Some(LockIntent::Shared));
    }

    #[tokio::test]
    async fn test_owner_never_waits_on_itself() {
        let table = PageLockTable::default();
        let stats = PageStoreStats::new();
        let owner = LockOwner::unique();

        assert!(table.try_lock(PageId::new(2), owner, LockIntent::Exclusive));
        table
            .lock(PageId::new(2), owner, LockIntent::Exclusive, Duration::ZERO, &stats)
            .await
            .unwrap();
        assert!(table.try_lock(PageId::new(2), owner, LockIntent::Shared));
        assert_eq!(table.mode(PageId::new(2), owner), Some(LockIntent::Exclusive));
        assert!(!table.try_lock(PageId::new(2), LockOwner::unique(), LockIntent::Shared));
    }

    #[tokio::test]
    async fn test_upgrade_waits_for_other_readers() {
        let table = PageLockTable::default();
        let (a, b) = (LockOwner::unique(), LockOwner::unique());
        assert!(table.try_lock(PageId::new(4), a, LockIntent::Shared));
        assert!(table.try_lock(PageId::new(4), b, LockIntent::Shared));

        assert!(!table.try_lock(PageId::new(4), a, LockIntent::Exclusive));
        table.unlock(PageId::new(4), b);
        assert!(table.try_lock(PageId::new(4), a, LockIntent::Exclusive));
    }

    #[tokio::test]
    async fn test_unlock_unblocks() {
        let table = PageLockTable::default();
        let stats = PageStoreStats::new();
        let (holder, waiter) = (LockOwner::unique(), LockOwner::unique());
        assert!(table.try_lock(PageId::new(3), holder, LockIntent::Exclusive));
        assert!(!table.try_lock(PageId::new(3), waiter, LockIntent::Shared));

        table.unlock(PageId::new(3), holder);
        table.unlock(PageId::new(3), holder);
        assert_eq!(table.mode(PageId::new(3), holder), None);

        table
            .lock(PageId::new(3), waiter, LockIntent::Exclusive, Duration::ZERO, &stats)
            .await
            .unwrap();
    }
}
