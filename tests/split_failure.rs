//! A root split that fails part way leaves a searchable tree behind.

mod common;

use std::io;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use blinkdex::{
    Error, FileGroupId, IndexConfig, IndexId, IndexManager, IndexSubKind, LockIntent, LockOwner,
    MemoryPageStore, ObjectContext, ObjectId, Page, PageId, PageStore, Result, RootIndexInfo,
};
use common::{check_tree, init_tracing, OBJECT};

/// A memory store whose writes can be made to fail on demand.
struct FlakyStore {
    inner: MemoryPageStore,
    /// Saves still allowed before the next one fails; negative when disarmed.
    saves_left: AtomicI64,
    fail_root_info: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: MemoryPageStore::new(),
            saves_left: AtomicI64::new(-1),
            fail_root_info: AtomicBool::new(false),
        }
    }

    /// Let `allowed` more page saves through, then fail one.
    fn fail_save_after(&self, allowed: i64) {
        self.saves_left.store(allowed, Ordering::SeqCst);
    }

    fn fail_next_root_info(&self) {
        self.fail_root_info.store(true, Ordering::SeqCst);
    }
}

fn injected() -> Error {
    Error::Io(io::Error::other("injected write failure"))
}

#[async_trait]
impl PageStore for FlakyStore {
    async fn allocate_page(&self, file_group: FileGroupId) -> Result<PageId> {
        self.inner.allocate_page(file_group).await
    }

    async fn load_page(
        &self,
        page_id: PageId,
        owner: LockOwner,
        intent: LockIntent,
        timeout: Duration,
    ) -> Result<Box<Page>> {
        self.inner.load_page(page_id, owner, intent, timeout).await
    }

    fn unlock_page(&self, page_id: PageId, owner: LockOwner) {
        self.inner.unlock_page(page_id, owner)
    }

    async fn save_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let left = self.saves_left.load(Ordering::SeqCst);
        if left == 0 {
            self.saves_left.store(-1, Ordering::SeqCst);
            return Err(injected());
        }
        if left > 0 {
            self.saves_left.store(left - 1, Ordering::SeqCst);
        }
        self.inner.save_page(page_id, page).await
    }

    async fn deallocate_page(&self, page_id: PageId) -> Result<()> {
        self.inner.deallocate_page(page_id).await
    }

    async fn first_data_page(&self, object_id: ObjectId) -> Result<Option<PageId>> {
        self.inner.first_data_page(object_id).await
    }

    async fn next_data_page(&self, page_id: PageId) -> Result<Option<PageId>> {
        self.inner.next_data_page(page_id).await
    }

    async fn save_root_info(&self, info: &RootIndexInfo) -> Result<()> {
        if self.fail_root_info.swap(false, Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.save_root_info(info).await
    }

    async fn load_root_infos(&self, object_id: ObjectId) -> Result<Vec<RootIndexInfo>> {
        self.inner.load_root_infos(object_id).await
    }
}

/// Four entries `0, 10, 20, 30` in a single root leaf.
async fn single_leaf() -> (Arc<FlakyStore>, IndexManager<i64>, IndexId, Vec<PageId>) {
    init_tracing();
    let store = Arc::new(FlakyStore::new());
    store.inner.create_object(OBJECT, FileGroupId::PRIMARY).unwrap();
    let pages = (0..4)
        .map(|_| store.inner.append_data_page(OBJECT).unwrap())
        .collect();
    let ctx = ObjectContext::strided(OBJECT, FileGroupId::PRIMARY, 10);
    let config = IndexConfig::default().with_max_entries_per_page(8).unwrap();
    let manager = IndexManager::new(store.clone(), ctx, config);
    let index = manager
        .create_index("pk", FileGroupId::PRIMARY, IndexSubKind(0))
        .await
        .unwrap();
    (store, manager, index, pages)
}

async fn assert_all_found(manager: &IndexManager<i64>, index: IndexId, pages: &[PageId]) {
    for (i, page) in pages.iter().enumerate() {
        let key = i as i64 * 10;
        let hit = manager.find(index, &key, false).await.unwrap();
        assert_eq!(hit.exact(&key).map(|e| e.pointer()), Some(*page), "key {key}");
    }
}

/// Writing the new root fails: the old root is untouched and stays usable.
#[tokio::test]
async fn test_new_root_write_failure_keeps_old_root() {
    let (store, manager, index, pages) = single_leaf().await;
    let root = manager.root_info(index).unwrap().root_page();

    // the right half is written, the new root is not
    store.fail_save_after(1);
    let err = manager.split_page(index, root).await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));

    let info = manager.root_info(index).unwrap();
    assert_eq!(info.root_page(), root);
    let page = manager.read_page(root).await.unwrap();
    assert!(page.is_root());
    assert_eq!(page.len(), 4);
    assert_eq!(page.next(), None);

    assert_all_found(&manager, index, &pages).await;
    manager.insert(index, 15, PageId::new(1)).await.unwrap();
    manager.split_page(index, root).await.unwrap();
    assert_eq!(check_tree(&manager, index).await.leaf_entries().len(), 5);
}

/// Demoting the old root fails after the new root is on disk: nothing the
/// registry can reach has changed.
#[tokio::test]
async fn test_demotion_failure_keeps_old_root() {
    let (store, manager, index, pages) = single_leaf().await;
    let root = manager.root_info(index).unwrap().root_page();

    store.fail_save_after(2);
    assert!(manager.split_page(index, root).await.is_err());

    let page = manager.read_page(root).await.unwrap();
    assert!(page.is_root());
    assert_eq!(page.parent(), None);
    assert_eq!(page.len(), 4);

    assert_all_found(&manager, index, &pages).await;
    manager.insert(index, 25, PageId::new(1)).await.unwrap();
    assert_eq!(check_tree(&manager, index).await.leaf_entries().len(), 5);
}

/// Publishing the new root fails: the registry still names the old page,
/// whose parent is a complete root and whose right sibling holds the moved
/// entries.
#[tokio::test]
async fn test_publish_failure_leaves_linked_tree() {
    let (store, manager, index, pages) = single_leaf().await;
    let root = manager.root_info(index).unwrap().root_page();

    store.fail_next_root_info();
    assert!(manager.split_page(index, root).await.is_err());
    assert_eq!(manager.root_info(index).unwrap().root_page(), root);

    let left = manager.read_page(root).await.unwrap();
    let parent_id = left.parent().unwrap();
    let parent = manager.read_page(parent_id).await.unwrap();
    assert!(parent.is_root());
    assert_eq!(parent.len(), 2);
    assert_eq!(parent.children().next(), Some(root));
    assert_eq!(parent.children().nth(1), left.next());

    // searches starting at the stale root move right into the new half
    assert_all_found(&manager, index, &pages).await;
    manager.insert(index, 25, PageId::new(1)).await.unwrap();
    let hit = manager.find(index, &25, false).await.unwrap();
    assert_eq!(hit.page().page_id(), left.next().unwrap());
}
