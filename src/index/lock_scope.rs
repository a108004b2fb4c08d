//! Page locks held by one manager operation.

use std::collections::HashSet;
use std::time::Duration;

use parking_lot::Mutex;

use crate::common::{PageId, Result};
use crate::storage::page::Page;
use crate::storage::{LockIntent, LockOwner, PageStore};

/// Every page lock one operation takes, under a single [`LockOwner`].
///
/// Exclusive locks stay held until the scope is dropped, so a page a
/// mutation loaded cannot be loaded by anyone else until the mutation has
/// saved everything and returned (or failed). Shared locks cover only the
/// load itself. Dropping the scope releases everything, including when the
/// operation's future is cancelled.
pub(crate) struct LockScope<'a> {
    store: &'a dyn PageStore,
    owner: LockOwner,
    timeout: Duration,
    exclusive: Mutex<HashSet<PageId>>,
}

impl<'a> LockScope<'a> {
    pub(crate) fn new(store: &'a dyn PageStore, timeout: Duration) -> Self {
        Self {
            store,
            owner: LockOwner::unique(),
            timeout,
            exclusive: Mutex::new(HashSet::new()),
        }
    }

    /// Lock and load a page.
    pub(crate) async fn load(&self, page_id: PageId, intent: LockIntent) -> Result<Box<Page>> {
        let loaded = self
            .store
            .load_page(page_id, self.owner, intent, self.timeout)
            .await;
        match intent {
            LockIntent::Exclusive => {
                self.exclusive.lock().insert(page_id);
            }
            LockIntent::Shared => {
                if !self.exclusive.lock().contains(&page_id) {
                    self.store.unlock_page(page_id, self.owner);
                }
            }
        }
        loaded
    }

    /// Pages currently held exclusively.
    #[cfg(test)]
    pub(crate) fn held(&self) -> usize {
        self.exclusive.lock().len()
    }
}

impl Drop for LockScope<'_> {
    fn drop(&mut self) {
        let held = std::mem::take(self.exclusive.get_mut());
        if held.is_empty() {
            return;
        }
        for page_id in &held {
            self.store.unlock_page(*page_id, self.owner);
        }
        tracing::trace!(target: "blinkdex::manager", owner = ?self.owner, pages = held.len(), "page locks released");
    }
}
