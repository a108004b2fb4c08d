//! File-backed [`PageStore`].
//!
//! One database file holds every page: index pages, object data pages and
//! one [`SchemaPage`] per object. Reopening a file rediscovers its objects
//! by scanning for schema pages.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::common::{Error, FileGroupId, ObjectId, PageId, Result};
use crate::index::RootIndexInfo;
use crate::storage::disk_manager::DiskManager;
use crate::storage::lock_table::PageLockTable;
use crate::storage::page::{DataPageHeader, Page, PageType, SchemaPage};
use crate::storage::page_store::{LockIntent, LockOwner, PageStore};
use crate::storage::stats::PageStoreStats;

/// A [`PageStore`] over a single database file.
///
/// # Thread Safety
/// The [`DiskManager`] sits behind a `parking_lot::Mutex`; every trait call
/// takes it once and releases it before returning, so no lock is held across
/// an await point.
pub struct FilePageStore {
    disk: Mutex<DiskManager>,
    /// Object id -> (schema page id, decoded schema).
    schemas: Mutex<HashMap<ObjectId, (PageId, SchemaPage)>>,
    locks: PageLockTable,
    stats: PageStoreStats,
}

impl FilePageStore {
    /// Create a new, empty database file.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let disk = DiskManager::create(path)?;
        Ok(Self::with_disk(disk, HashMap::new()))
    }

    /// Open an existing database file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut disk = DiskManager::open(path)?;

        let mut schemas = HashMap::new();
        for page_id in disk.pages_of_type(PageType::Schema)? {
            let page = disk.read_page(page_id)?;
            if !page.verify_checksum() {
                return Err(Error::ChecksumMismatch(page_id));
            }
            let schema = SchemaPage::read_from(page_id, &page)?;
            schemas.insert(schema.object_id, (page_id, schema));
        }
        tracing::debug!(
            target: "blinkdex::store",
            objects = schemas.len(),
            pages = disk.page_count(),
            free = disk.free_page_count(),
            "page file opened"
        );

        Ok(Self::with_disk(disk, schemas))
    }

    fn with_disk(disk: DiskManager, schemas: HashMap<ObjectId, (PageId, SchemaPage)>) -> Self {
        Self {
            disk: Mutex::new(disk),
            schemas: Mutex::new(schemas),
            locks: PageLockTable::default(),
            stats: PageStoreStats::new(),
        }
    }

    /// Register an object, giving it a schema page. Registering an existing
    /// object is a no-op.
    pub fn create_object(&self, object_id: ObjectId, file_group: FileGroupId) -> Result<()> {
        let mut schemas = self.schemas.lock();
        if schemas.contains_key(&object_id) {
            return Ok(());
        }

        let schema = SchemaPage::new(object_id, file_group);
        let page_id = self.write_new_schema(&schema)?;
        schemas.insert(object_id, (page_id, schema));
        Ok(())
    }

    /// Allocate a data page and link it at the tail of the object's chain.
    pub fn append_data_page(&self, object_id: ObjectId) -> Result<PageId> {
        let mut schemas = self.schemas.lock();
        let (schema_page_id, schema) = schemas
            .get_mut(&object_id)
            .ok_or(Error::UnknownObject(object_id))?;
        let mut disk = self.disk.lock();

        let page_id = disk.allocate_page()?;
        PageStoreStats::bump(&self.stats.pages_allocated);

        let mut header = DataPageHeader::new(object_id);
        header.prev = schema.last_data_page;
        let mut page = Page::boxed();
        header.write_to(&mut page);
        disk.write_page(page_id, &page)?;

        if let Some(prev_id) = schema.last_data_page {
            let mut prev = disk.read_page(prev_id)?;
            let mut prev_header = DataPageHeader::read_from(prev_id, &prev)?;
            prev_header.next = Some(page_id);
            prev_header.write_to(&mut prev);
            disk.write_page(prev_id, &prev)?;
        }

        schema.first_data_page.get_or_insert(page_id);
        schema.last_data_page = Some(page_id);
        Self::write_schema(&mut disk, *schema_page_id, schema)?;
        Ok(page_id)
    }

    /// Take a page lock for an outside owner without waiting.
    ///
    /// Returns `false` when another owner holds a conflicting lock. Release
    /// with [`PageStore::unlock_page`].
    pub fn try_lock_page(&self, page_id: PageId, owner: LockOwner, intent: LockIntent) -> bool {
        self.locks.try_lock(page_id, owner, intent)
    }

    /// Pages in the file, including free ones.
    pub fn page_count(&self) -> u32 {
        self.disk.lock().page_count()
    }

    /// Pages waiting on the free list.
    pub fn free_page_count(&self) -> usize {
        self.disk.lock().free_page_count()
    }

    pub fn stats(&self) -> &PageStoreStats {
        &self.stats
    }

    fn write_new_schema(&self, schema: &SchemaPage) -> Result<PageId> {
        let mut disk = self.disk.lock();
        let page_id = disk.allocate_page()?;
        Self::write_schema(&mut disk, page_id, schema)?;
        Ok(page_id)
    }

    fn write_schema(disk: &mut DiskManager, page_id: PageId, schema: &SchemaPage) -> Result<()> {
        let mut page = Page::boxed();
        schema.write_to(&mut page);
        disk.write_page(page_id, &page)
    }
}

#[async_trait]
impl PageStore for FilePageStore {
    async fn allocate_page(&self, file_group: FileGroupId) -> Result<PageId> {
        let page_id = self.disk.lock().allocate_page()?;
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

        let page = {
            let mut disk = self.disk.lock();
            if disk.is_free(page_id) {
                return Err(Error::PageNotFound(page_id));
            }
            disk.read_page(page_id)?
        };
        if !page.is_zeroed() && !page.verify_checksum() {
            return Err(Error::ChecksumMismatch(page_id));
        }

        PageStoreStats::bump(&self.stats.pages_read);
        tracing::trace!(target: "blinkdex::store", %page_id, ?intent, "page loaded");
        Ok(page)
    }

    fn unlock_page(&self, page_id: PageId, owner: LockOwner) {
        self.locks.unlock(page_id, owner);
    }

    async fn save_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let mut disk = self.disk.lock();
        if disk.is_free(page_id) {
            return Err(Error::PageNotFound(page_id));
        }
        disk.write_page(page_id, page)?;
        PageStoreStats::bump(&self.stats.pages_written);
        tracing::trace!(target: "blinkdex::store", %page_id, "page saved");
        Ok(())
    }

    async fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        self.disk.lock().deallocate_page(page_id)?;
        PageStoreStats::bump(&self.stats.pages_deallocated);
        tracing::trace!(target: "blinkdex::store", %page_id, "page released");
        Ok(())
    }

    async fn first_data_page(&self, object_id: ObjectId) -> Result<Option<PageId>> {
        self.schemas
            .lock()
            .get(&object_id)
            .map(|(_, schema)| schema.first_data_page)
            .ok_or(Error::UnknownObject(object_id))
    }

    async fn next_data_page(&self, page_id: PageId) -> Result<Option<PageId>> {
        let page = self.disk.lock().read_page(page_id)?;
        if !page.verify_checksum() {
            return Err(Error::ChecksumMismatch(page_id));
        }
        Ok(DataPageHeader::read_from(page_id, &page)?.next)
    }

    async fn save_root_info(&self, info: &RootIndexInfo) -> Result<()> {
        let mut schemas = self.schemas.lock();
        let (schema_page_id, schema) = schemas
            .get_mut(&info.object_id())
            .ok_or(Error::UnknownObject(info.object_id()))?;
        schema.upsert_index(info)?;
        Self::write_schema(&mut self.disk.lock(), *schema_page_id, schema)
    }

    async fn load_root_infos(&self, object_id: ObjectId) -> Result<Vec<RootIndexInfo>> {
        self.schemas
            .lock()
            .get(&object_id)
            .map(|(_, schema)| schema.indexes.clone())
            .ok_or(Error::UnknownObject(object_id))
    }
}
