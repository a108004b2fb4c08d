//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use tracing_subscriber::EnvFilter;

use blinkdex::{
    FileGroupId, IndexConfig, IndexId, IndexManager, IndexPage, IndexSubKind, MemoryPageStore,
    ObjectContext, ObjectId, PageId,
};

pub const OBJECT: ObjectId = ObjectId(1);

/// Route `tracing` output through the test harness; `RUST_LOG` overrides
/// the filter.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("blinkdex=info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_test_writer()
            .try_init();
    });
}

/// A memory store holding `data_pages` data pages and an index over them
/// keyed `0, 10, 20, ...`.
pub async fn indexed_store(
    data_pages: usize,
    config: IndexConfig,
) -> (Arc<MemoryPageStore>, IndexManager<i64>, IndexId, Vec<PageId>) {
    init_tracing();
    let store = Arc::new(MemoryPageStore::new());
    store.create_object(OBJECT, FileGroupId::PRIMARY).unwrap();
    let pages = (0..data_pages)
        .map(|_| store.append_data_page(OBJECT).unwrap())
        .collect();
    let ctx = ObjectContext::strided(OBJECT, FileGroupId::PRIMARY, 10);
    let manager = IndexManager::new(store.clone(), ctx, config);
    let index = manager
        .create_index("pk", FileGroupId::PRIMARY, IndexSubKind(0))
        .await
        .unwrap();
    (store, manager, index, pages)
}

pub fn config(max_entries: u16, fill_factor: u8) -> IndexConfig {
    IndexConfig::default()
        .with_fill_factor(fill_factor)
        .unwrap()
        .with_max_entries_per_page(max_entries)
        .unwrap()
}

/// Every level of a tree, root first.
pub struct TreeShape {
    pub levels: Vec<Vec<IndexPage<i64>>>,
}

impl TreeShape {
    pub fn leaves(&self) -> &[IndexPage<i64>] {
        self.levels.last().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn leaf_entries(&self) -> Vec<(i64, PageId)> {
        self.leaves()
            .iter()
            .flat_map(|page| page.entries().iter().map(|e| (*e.key(), e.pointer())))
            .collect()
    }

    pub fn page_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }
}

/// Walk the tree level by level from the root and assert its linkage:
/// sibling chains match child order, parent pointers and depths agree,
/// keys strictly increase along each level, and every separator is no
/// greater than the first key of its child.
pub async fn check_tree(manager: &IndexManager<i64>, index: IndexId) -> TreeShape {
    let info = manager.root_info(index).expect("index is registered");
    let root = manager.read_page(info.root_page()).await.unwrap();
    assert!(root.is_root(), "{} is not flagged root", root.page_id());
    assert_eq!(root.parent(), None);
    assert_eq!(root.depth(), info.root_depth());

    let mut levels = Vec::new();
    let mut level = vec![root];
    loop {
        assert_eq!(level[0].prev(), None, "leftmost page has a prev link");
        assert_eq!(level[level.len() - 1].next(), None, "rightmost page has a next link");
        for pair in level.windows(2) {
            assert_eq!(pair[0].next(), Some(pair[1].page_id()));
            assert_eq!(pair[1].prev(), Some(pair[0].page_id()));
        }
        let keys: Vec<i64> = level
            .iter()
            .flat_map(|page| page.entries().iter().map(|e| *e.key()))
            .collect();
        assert!(
            keys.windows(2).all(|w| w[0] < w[1]),
            "keys out of order at depth {}: {keys:?}",
            level[0].depth()
        );

        if level[0].is_leaf() {
            assert!(level.iter().all(|page| page.depth() == 0));
            levels.push(level);
            return TreeShape { levels };
        }

        let mut below = Vec::new();
        for page in &level {
            assert!(!page.is_leaf());
            for entry in page.entries() {
                let child = manager.read_page(entry.pointer()).await.unwrap();
                assert_eq!(child.parent(), Some(page.page_id()));
                assert_eq!(child.depth() + 1, page.depth());
                assert!(!child.is_root());
                if let Some(first) = child.first_key() {
                    assert!(entry.key() <= first, "separator above child's first key");
                }
                below.push(child);
            }
        }
        levels.push(level);
        level = below;
    }
}
