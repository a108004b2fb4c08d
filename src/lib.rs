//! blinkdex - a page-organized B-link tree index core.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            blinkdex                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/)                        │   │
//! │  │   IndexManager + Pipeline (exclusive | concurrent)      │   │
//! │  │   rebuild · find · insert · split · merge · enumerate   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Page Store (storage/)  [async trait]          │   │
//! │  │     MemoryPageStore  ←─OR─→  FilePageStore               │   │
//! │  │        page locks with timeout + PageStoreStats         │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Disk Layer (storage/)                          │   │
//! │  │   DiskManager + Page + PageHeader + schema/data pages   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, identifiers, Error, config)
//! - [`storage`] - Page formats, disk I/O and the page-store seam
//! - [`index`] - The B-link tree and its manager
//!
//! # Quick Start
//! ```
//! use std::sync::Arc;
//! use blinkdex::{FileGroupId, IndexConfig, IndexManager, IndexSubKind, MemoryPageStore, ObjectContext, ObjectId};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = Arc::new(MemoryPageStore::new());
//! store.create_object(ObjectId(7), FileGroupId::PRIMARY).unwrap();
//! let first = store.append_data_page(ObjectId(7)).unwrap();
//! store.append_data_page(ObjectId(7)).unwrap();
//!
//! let ctx = ObjectContext::strided(ObjectId(7), FileGroupId::PRIMARY, 100);
//! let manager = IndexManager::new(store.clone(), ctx, IndexConfig::default());
//! let index = manager.create_index("pk", FileGroupId::PRIMARY, IndexSubKind(0)).await.unwrap();
//!
//! let hit = manager.find(index, &0, false).await.unwrap();
//! assert_eq!(hit.entry().map(|e| e.pointer()), Some(first));
//! println!("{}", store.stats().snapshot());
//! # });
//! ```

pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{IndexConfig, PAGE_SIZE};
pub use common::{Error, FileGroupId, IndexId, IndexSubKind, ObjectId, PageId, Result};

pub use index::{
    IndexEntry, IndexKey, IndexManager, IndexPage, Landing, ObjectContext, RootIndexInfo,
    SearchResult,
};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::{
    DiskManager, FilePageStore, LockIntent, LockOwner, MemoryPageStore, PageStore,
    PageStoreStats, StoreStatsSnapshot,
};
