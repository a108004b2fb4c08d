//! Index manager: one per indexable object.
//!
//! The manager owns the registry of [`RootIndexInfo`] descriptors and the
//! two-lane [`Pipeline`]. Every public operation is submitted through the
//! pipeline; nested work (create triggering a rebuild, an insert splitting
//! pages on the way down, enumerate locating its start) calls the internal
//! handlers directly so a request never waits on its own lane.
//!
//! Each operation loads pages through its own [`LockScope`]. A page loaded
//! for writing stays locked in the store until the operation returns, so
//! outside lock holders and the manager's readers never see it half done.
//!
//! The handlers themselves live next to this file:
//! - `rebuild.rs` - create and bulk bottom-up rebuild
//! - `search.rs` - crab search, insert and range enumeration
//! - `structure.rs` - split, merge and root growth/collapse

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::config::IndexConfig;
use crate::common::{Error, FileGroupId, IndexId, IndexSubKind, ObjectId, PageId, Result};
use crate::storage::{LockIntent, PageStore};

use super::context::ObjectContext;
use super::entry::IndexEntry;
use super::key::IndexKey;
use super::lock_scope::LockScope;
use super::page::IndexPage;
use super::pipeline::Pipeline;
use super::root_info::RootIndexInfo;
use super::search::SearchResult;

/// Orchestrates every index defined on one object.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use blinkdex::{FileGroupId, IndexConfig, IndexManager, IndexSubKind, MemoryPageStore, ObjectContext, ObjectId};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let store = Arc::new(MemoryPageStore::new());
/// store.create_object(ObjectId(1), FileGroupId::PRIMARY).unwrap();
///
/// let ctx = ObjectContext::strided(ObjectId(1), FileGroupId::PRIMARY, 10);
/// let manager = IndexManager::new(store, ctx, IndexConfig::default());
/// let index = manager.create_index("by_ordinal", FileGroupId::PRIMARY, IndexSubKind(0)).await.unwrap();
///
/// let hit = manager.find(index, &0, false).await.unwrap();
/// assert!(hit.entry().is_none()); // no data yet
/// # });
/// ```
pub struct IndexManager<K: IndexKey> {
    pub(crate) store: Arc<dyn PageStore>,
    pub(crate) context: ObjectContext<K>,
    pub(crate) config: IndexConfig,
    pub(crate) capacity: usize,
    registry: RwLock<BTreeMap<IndexId, RootIndexInfo>>,
    pipeline: Pipeline,
}

impl<K: IndexKey> IndexManager<K> {
    /// A manager with an empty registry.
    pub fn new(store: Arc<dyn PageStore>, context: ObjectContext<K>, config: IndexConfig) -> Self {
        let capacity = IndexPage::<K>::capacity_for(&config);
        Self {
            store,
            context,
            config,
            capacity,
            registry: RwLock::new(BTreeMap::new()),
            pipeline: Pipeline::new(),
        }
    }

    /// A manager whose registry is restored from the store.
    pub async fn open(
        store: Arc<dyn PageStore>,
        context: ObjectContext<K>,
        config: IndexConfig,
    ) -> Result<Self> {
        let infos = store.load_root_infos(context.object_id()).await?;
        let manager = Self::new(store, context, config);
        {
            let mut registry = manager.registry.write();
            for info in infos {
                registry.insert(info.index_id(), info);
            }
        }
        tracing::info!(
            target: "blinkdex::manager",
            object = %manager.context.object_id(),
            indexes = manager.registry.read().len(),
            "index registry restored"
        );
        Ok(manager)
    }

    // ========================================================================
    // Exclusive lane
    // ========================================================================

    /// Define a new index on the object and build it if the object already
    /// has data.
    ///
    /// # Errors
    /// `DuplicateSubKind` (before any page I/O) when the object already has
    /// an index of `sub_kind`; `IdentifierSpaceExhausted` when no identifier
    /// is left above the current maximum.
    pub async fn create_index(
        &self,
        name: &str,
        file_group: FileGroupId,
        sub_kind: IndexSubKind,
    ) -> Result<IndexId> {
        self.pipeline
            .exclusive("create", async {
                let locks = self.lock_scope();
                self.create_inner(&locks, name, file_group, sub_kind).await
            })
            .await
    }

    /// Rebuild an index bottom-up from the object's data-page chain.
    pub async fn rebuild_index(
        &self,
        file_group: FileGroupId,
        object_id: ObjectId,
        index_id: IndexId,
    ) -> Result<()> {
        self.pipeline
            .exclusive("rebuild", async {
                let locks = self.lock_scope();
                self.rebuild_inner(&locks, file_group, object_id, index_id).await
            })
            .await
    }

    // ========================================================================
    // Concurrent lane
    // ========================================================================

    /// Crab search for `key`.
    ///
    /// With `for_insert`, pages that need splitting are split on the way
    /// down and separators left of the key are lowered to it, so the search
    /// runs as a writer.
    pub async fn find(&self, index_id: IndexId, key: &K, for_insert: bool) -> Result<SearchResult<K>> {
        let search = async {
            let locks = self.lock_scope();
            self.find_inner(&locks, index_id, key, for_insert).await
        };
        if for_insert {
            self.pipeline.concurrent_writer("find", search).await
        } else {
            self.pipeline.concurrent("find", search).await
        }
    }

    /// Index `data_page` under `key`.
    ///
    /// # Errors
    /// `DuplicateKey` when the key is already present.
    pub async fn insert(&self, index_id: IndexId, key: K, data_page: PageId) -> Result<()> {
        self.pipeline
            .concurrent_writer("insert", async {
                let locks = self.lock_scope();
                self.insert_inner(&locks, index_id, key, data_page).await
            })
            .await
    }

    /// Split a page in two. Returns the ids of the left and right halves.
    pub async fn split_page(&self, index_id: IndexId, page_id: PageId) -> Result<(PageId, PageId)> {
        self.pipeline
            .concurrent_writer("split", async {
                let locks = self.lock_scope();
                let page = self.load(&locks, page_id, LockIntent::Exclusive).await?;
                self.check_owner(index_id, &page)?;
                let (left, right) = self.split_inner(&locks, index_id, page).await?;
                Ok((left.page_id(), right.page_id()))
            })
            .await
    }

    /// Fold `absorbed` into its left sibling `primary`.
    ///
    /// `parent` defaults to the absorbed page's recorded parent.
    pub async fn merge_pages(
        &self,
        index_id: IndexId,
        parent: Option<PageId>,
        primary: PageId,
        absorbed: PageId,
    ) -> Result<()> {
        self.pipeline
            .concurrent_writer("merge", async {
                let locks = self.lock_scope();
                self.merge_inner(&locks, index_id, parent, primary, absorbed)
                    .await
                    .map(|_| ())
            })
            .await
    }

    /// Visit leaf entries with `from <= key <= to` in key order.
    ///
    /// `on_entry` receives the page, the entry and a zero-based visitation
    /// ordinal, and returns `false` to stop early. Returns the number of
    /// entries visited.
    pub async fn enumerate<F>(&self, index_id: IndexId, from: &K, to: &K, on_entry: F) -> Result<usize>
    where
        F: FnMut(&IndexPage<K>, &IndexEntry<K>, usize) -> bool + Send,
    {
        self.pipeline
            .concurrent("enumerate", async {
                let locks = self.lock_scope();
                self.enumerate_inner(&locks, index_id, from, to, on_entry).await
            })
            .await
    }

    /// Load and decode an index page.
    pub async fn read_page(&self, page_id: PageId) -> Result<IndexPage<K>> {
        self.pipeline
            .concurrent("read", async {
                let locks = self.lock_scope();
                self.load(&locks, page_id, LockIntent::Shared).await
            })
            .await
    }

    // ========================================================================
    // Registry
    // ========================================================================

    /// Descriptors of every defined index, by identifier.
    pub fn indices(&self) -> Vec<RootIndexInfo> {
        self.registry.read().values().cloned().collect()
    }

    pub fn root_info(&self, index_id: IndexId) -> Option<RootIndexInfo> {
        self.registry.read().get(&index_id).cloned()
    }

    pub fn context(&self) -> &ObjectContext<K> {
        &self.context
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Entries per index page under this manager's configuration.
    pub fn page_capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn require_info(&self, index_id: IndexId) -> Result<RootIndexInfo> {
        self.root_info(index_id).ok_or(Error::IndexNotFound(index_id))
    }

    pub(crate) fn registered_sub_kind(&self, sub_kind: IndexSubKind) -> bool {
        self.registry
            .read()
            .values()
            .any(|info| info.sub_kind() == sub_kind)
    }

    pub(crate) fn next_index_id(&self) -> Result<IndexId> {
        match self.registry.read().keys().next_back() {
            None => Ok(IndexId::FIRST),
            Some(max) => max.next().ok_or(Error::IdentifierSpaceExhausted),
        }
    }

    /// Record a descriptor in memory and in the store.
    pub(crate) async fn publish(&self, info: RootIndexInfo) -> Result<()> {
        self.store.save_root_info(&info).await?;
        self.registry.write().insert(info.index_id(), info);
        Ok(())
    }

    /// Point an index at a new root and persist the change.
    pub(crate) async fn set_root(&self, index_id: IndexId, root: &IndexPage<K>) -> Result<()> {
        let mut info = self.require_info(index_id)?;
        info.set_root(root.page_id(), root.depth());
        tracing::debug!(
            target: "blinkdex::manager",
            index = %index_id,
            root = %root.page_id(),
            depth = root.depth(),
            "root moved"
        );
        self.publish(info).await
    }

    // ========================================================================
    // Page I/O
    // ========================================================================

    /// A fresh set of page locks for one operation.
    pub(crate) fn lock_scope(&self) -> LockScope<'_> {
        LockScope::new(self.store.as_ref(), self.config.lock_timeout)
    }

    pub(crate) async fn load(
        &self,
        locks: &LockScope<'_>,
        page_id: PageId,
        intent: LockIntent,
    ) -> Result<IndexPage<K>> {
        let raw = locks.load(page_id, intent).await?;
        IndexPage::decode(page_id, &raw, self.capacity)
    }

    pub(crate) async fn save(&self, page: &IndexPage<K>) -> Result<()> {
        let raw = page.encode();
        self.store.save_page(page.page_id(), &raw).await
    }

    /// Allocate and format a page for `info`'s index.
    ///
    /// The new page is locked like any page the operation loaded for
    /// writing; it becomes reachable before the operation ends.
    pub(crate) async fn init_page(
        &self,
        locks: &LockScope<'_>,
        info: &RootIndexInfo,
        depth: u8,
        root: bool,
    ) -> Result<IndexPage<K>> {
        let page_id = self.store.allocate_page(info.file_group()).await?;
        locks.load(page_id, LockIntent::Exclusive).await?;
        Ok(IndexPage::new(
            page_id,
            info.index_id(),
            info.object_id(),
            info.file_group(),
            depth,
            root,
            self.capacity,
        ))
    }

    pub(crate) fn check_owner(&self, index_id: IndexId, page: &IndexPage<K>) -> Result<()> {
        if page.index_id() != index_id {
            return Err(Error::structural(format!(
                "{} belongs to {}, not {index_id}",
                page.page_id(),
                page.index_id()
            )));
        }
        Ok(())
    }
}
