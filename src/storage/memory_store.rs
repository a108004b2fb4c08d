//! In-memory [`PageStore`].
//!
//! Pages live as owned 4KB images in a map. Objects and their data-page
//! chains are registered explicitly, which makes this store the natural
//! backing for tests and for embedding the index without a file.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::common::{Error, FileGroupId, ObjectId, PageId, Result};
use crate::index::RootIndexInfo;
use crate::storage::lock_table::PageLockTable;
use crate::storage::page::{DataPageHeader, Page, SchemaPage};
use crate::storage::page_store::{LockIntent, LockOwner, PageStore};
use crate::storage::stats::PageStoreStats;

#[derive(Default)]
struct MemoryState {
    pages: HashMap<PageId, Box<Page>>,
    next_page_id: u32,
    free_pages: Vec<PageId>,
    /// Per-object catalog; the same record the file store persists.
    objects: HashMap<ObjectId, SchemaPage>,
}

impl MemoryState {
    fn allocate(&mut self) -> Result<PageId> {
        let page_id = match self.free_pages.pop() {
            Some(page_id) => page_id,
            None => {
                if self.next_page_id == u32::MAX {
                    return Err(Error::structural("memory store has no page ids left"));
                }
                let page_id = PageId::new(self.next_page_id);
                self.next_page_id += 1;
                page_id
            }
        };
        self.pages.insert(page_id, Page::boxed());
        Ok(page_id)
    }

    fn object_mut(&mut self, object_id: ObjectId) -> Result<&mut SchemaPage> {
        self.objects
            .get_mut(&object_id)
            .ok_or(Error::UnknownObject(object_id))
    }
}

/// A [`PageStore`] that keeps every page in memory.
///
/// All file groups share one page-id space.
///
/// # Example
/// ```
/// use blinkdex::{FileGroupId, MemoryPageStore, ObjectId};
///
/// let store = MemoryPageStore::new();
/// store.create_object(ObjectId(1), FileGroupId::PRIMARY).unwrap();
/// let first = store.append_data_page(ObjectId(1)).unwrap();
/// assert!(store.contains_page(first));
/// ```
#[derive(Default)]
pub struct MemoryPageStore {
    state: Mutex<MemoryState>,
    locks: PageLockTable,
    stats: PageStoreStats,
}

impl MemoryPageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an object so data pages and index descriptors can be
    /// attached to it. Registering an existing object is a no-op.
    pub fn create_object(&self, object_id: ObjectId, file_group: FileGroupId) -> Result<()> {
        self.state
            .lock()
            .objects
            .entry(object_id)
            .or_insert_with(|| SchemaPage::new(object_id, file_group));
        Ok(())
    }

    /// Allocate a data page and link it at the tail of the object's chain.
    pub fn append_data_page(&self, object_id: ObjectId) -> Result<PageId> {
        let mut state = self.state.lock();
        let last = state.object_mut(object_id)?.last_data_page;

        let page_id = state.allocate()?;
        PageStoreStats::bump(&self.stats.pages_allocated);

        let mut header = DataPageHeader::new(object_id);
        header.prev = last;
        let mut page = Page::boxed();
        header.write_to(&mut page);
        state.pages.insert(page_id, page);

        if let Some(prev_id) = last {
            let prev = state
                .pages
                .get_mut(&prev_id)
                .ok_or(Error::PageNotFound(prev_id))?;
            let mut prev_header = DataPageHeader::read_from(prev_id, prev)?;
            prev_header.next = Some(page_id);
            prev_header.write_to(prev);
        }

        let object = state.object_mut(object_id)?;
        object.first_data_page.get_or_insert(page_id);
        object.last_data_page = Some(page_id);
        Ok(page_id)
    }

    /// Take a page lock for an outside owner without waiting.
    ///
    /// Returns `false` when another owner holds a conflicting lock. Release
    /// with [`PageStore::unlock_page`].
    pub fn try_lock_page(&self, page_id: PageId, owner: LockOwner, intent: LockIntent) -> bool {
        self.locks.try_lock(page_id, owner, intent)
    }

    /// Whether the page is currently allocated.
    pub fn contains_page(&self, page_id: PageId) -> bool {
        self.state.lock().pages.contains_key(&page_id)
    }

    /// Number of allocated pages (data, index and otherwise).
    pub fn page_count(&self) -> usize {
        self.state.lock().pages.len()
    }

    /// Overwrite one byte of a stored page without touching its checksum.
    #[cfg(test)]
    pub(crate) fn corrupt_byte(&self, page_id: PageId, offset: usize) {
        if let Some(page) = self.state.lock().pages.get_mut(&page_id) {
            let byte = page.read_u8(offset);
            page.write_u8(offset, byte ^ 0xFF);
        }
    }

    pub fn stats(&self) -> &PageStoreStats {
        &self.stats
    }
}

#[async_trait]
impl PageStore for MemoryPageStore {
    async fn allocate_page(&self, file_group: FileGroupId) -> Result<PageId> {
        let page_id = self.state.lock().allocate()?;
        PageStoreStats::bump(&self.stats.pages_allocated);
        tracing::trace!(target: "blinkdex::store", %page_id, %file_group, "page allocated");
        Ok(page_id)
    }

    async fn load_page(
        &self,
        page_id: PageId,
        owner: LockOwner,
        intent: LockIntent,
        timeout: Duration,
    ) -> Result<Box<Page>> {
        self.locks.lock(page_id, owner, intent, timeout, &self.stats).await?;

        let mut copy = Page::boxed();
        {
            let state = self.state.lock();
            let page = state.pages.get(&page_id).ok_or(Error::PageNotFound(page_id))?;
            copy.copy_from(page);
        }
        if !copy.is_zeroed() && !copy.verify_checksum() {
            return Err(Error::ChecksumMismatch(page_id));
        }

        PageStoreStats::bump(&self.stats.pages_read);
        tracing::trace!(target: "blinkdex::store", %page_id, ?intent, "page loaded");
        Ok(copy)
    }

    fn unlock_page(&self, page_id: PageId, owner: LockOwner) {
        self.locks.unlock(page_id, owner);
    }

    async fn save_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let mut state = self.state.lock();
        let slot = state
            .pages
            .get_mut(&page_id)
            .ok_or(Error::PageNotFound(page_id))?;
        slot.copy_from(page);
        PageStoreStats::bump(&self.stats.pages_written);
        tracing::trace!(target: "blinkdex::store", %page_id, "page saved");
        Ok(())
    }

    async fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();
        if state.pages.remove(&page_id).is_none() {
            return Err(Error::PageNotFound(page_id));
        }
        state.free_pages.push(page_id);
        PageStoreStats::bump(&self.stats.pages_deallocated);
        tracing::trace!(target: "blinkdex::store", %page_id, "page released");
        Ok(())
    }

    async fn first_data_page(&self, object_id: ObjectId) -> Result<Option<PageId>> {
        Ok(self.state.lock().object_mut(object_id)?.first_data_page)
    }

    async fn next_data_page(&self, page_id: PageId) -> Result<Option<PageId>> {
        let state = self.state.lock();
        let page = state.pages.get(&page_id).ok_or(Error::PageNotFound(page_id))?;
        Ok(DataPageHeader::read_from(page_id, page)?.next)
    }

    async fn save_root_info(&self, info: &RootIndexInfo) -> Result<()> {
        self.state
            .lock()
            .object_mut(info.object_id())?
            .upsert_index(info)
    }

    async fn load_root_infos(&self, object_id: ObjectId) -> Result<Vec<RootIndexInfo>> {
        Ok(self.state.lock().object_mut(object_id)?.indexes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{IndexId, IndexSubKind};

    const WAIT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_allocate_save_load() {
        let store = MemoryPageStore::new();
        let owner = LockOwner::unique();
        let page_id = store.allocate_page(FileGroupId::PRIMARY).await.unwrap();

        let loaded = store
            .load_page(page_id, owner, LockIntent::Shared, WAIT)
            .await
            .unwrap();
        assert!(loaded.is_zeroed());

        let mut page = Page::new();
        page.write_u32(64, 7);
        page.update_checksum();
        store.save_page(page_id, &page).await.unwrap();

        let loaded = store
            .load_page(page_id, owner, LockIntent::Exclusive, WAIT)
            .await
            .unwrap();
        assert_eq!(loaded.read_u32(64), 7);
        assert_eq!(store.stats().snapshot().pages_written, 1);
    }

    #[tokio::test]
    async fn test_deallocate_then_load_fails() {
        let store = MemoryPageStore::new();
        let owner = LockOwner::unique();
        let page_id = store.allocate_page(FileGroupId::PRIMARY).await.unwrap();
        store.deallocate_page(page_id).await.unwrap();

        assert!(matches!(
            store.load_page(page_id, owner, LockIntent::Shared, WAIT).await,
            Err(Error::PageNotFound(_))
        ));
        assert!(store.deallocate_page(page_id).await.is_err());
        // freed slot is reused
        assert_eq!(store.allocate_page(FileGroupId::PRIMARY).await.unwrap(), page_id);
    }

    #[tokio::test]
    async fn test_data_chain() {
        let store = MemoryPageStore::new();
        let object = ObjectId(9);
        store.create_object(object, FileGroupId::PRIMARY).unwrap();
        assert_eq!(store.first_data_page(object).await.unwrap(), None);

        let pages: Vec<_> = (0..3).map(|_| store.append_data_page(object).unwrap()).collect();

        let mut walked = Vec::new();
        let mut cursor = store.first_data_page(object).await.unwrap();
        while let Some(page_id) = cursor {
            walked.push(page_id);
            cursor = store.next_data_page(page_id).await.unwrap();
        }
        assert_eq!(walked, pages);
    }

    #[tokio::test]
    async fn test_unknown_object() {
        let store = MemoryPageStore::new();
        assert!(matches!(
            store.first_data_page(ObjectId(1)).await,
            Err(Error::UnknownObject(ObjectId(1)))
        ));
        assert!(store.append_data_page(ObjectId(1)).is_err());
    }

    #[tokio::test]
    async fn test_root_info_catalog() {
        let store = MemoryPageStore::new();
        store.create_object(ObjectId(1), FileGroupId::PRIMARY).unwrap();
        let info = RootIndexInfo::new(
            IndexId(1),
            ObjectId(1),
            FileGroupId::PRIMARY,
            IndexSubKind(0),
            "pk",
            0,
        );
        store.save_root_info(&info).await.unwrap();

        assert_eq!(store.load_root_infos(ObjectId(1)).await.unwrap(), vec![info]);
    }

    #[tokio::test]
    async fn test_held_lock_times_out() {
        let store = MemoryPageStore::new();
        let page_id = store.allocate_page(FileGroupId::PRIMARY).await.unwrap();
        let (holder, owner) = (LockOwner::unique(), LockOwner::unique());
        assert!(store.try_lock_page(page_id, holder, LockIntent::Exclusive));

        let err = store
            .load_page(page_id, owner, LockIntent::Shared, WAIT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::LockTimeout { .. }));
        assert_eq!(store.stats().snapshot().lock_timeouts, 1);
        // the holder itself is never blocked
        assert!(store.load_page(page_id, holder, LockIntent::Exclusive, WAIT).await.is_ok());

        store.unlock_page(page_id, holder);
        assert!(store.load_page(page_id, owner, LockIntent::Shared, WAIT).await.is_ok());
    }

    #[tokio::test]
    async fn test_exclusive_load_holds_until_unlocked() {
        let store = MemoryPageStore::new();
        let page_id = store.allocate_page(FileGroupId::PRIMARY).await.unwrap();
        let (writer, reader) = (LockOwner::unique(), LockOwner::unique());

        store
            .load_page(page_id, writer, LockIntent::Exclusive, WAIT)
            .await
            .unwrap();
        assert!(!store.try_lock_page(page_id, reader, LockIntent::Shared));

        store.unlock_page(page_id, writer);
        assert!(store.try_lock_page(page_id, reader, LockIntent::Shared));
    }

    #[tokio::test]
    async fn test_corruption_detected() {
        let store = MemoryPageStore::new();
        store.create_object(ObjectId(1), FileGroupId::PRIMARY).unwrap();
        let page_id = store.append_data_page(ObjectId(1)).unwrap();
        store.corrupt_byte(page_id, 100);

        assert!(matches!(
            store.load_page(page_id, LockOwner::unique(), LockIntent::Shared, WAIT).await,
            Err(Error::ChecksumMismatch(_))
        ));
    }
}
