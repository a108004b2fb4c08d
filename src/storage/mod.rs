//! Storage layer - page formats, disk I/O and page stores.
//!
//! This module handles persistent storage:
//! - [`page`] - Page types and layouts
//! - [`DiskManager`] - Low-level file I/O
//! - [`PageStore`] - The async seam the index manager consumes
//! - [`MemoryPageStore`] / [`FilePageStore`] - Bundled implementations

mod disk_manager;
mod file_store;
mod lock_table;
mod memory_store;
pub mod page;
mod page_store;
mod stats;

pub use disk_manager::DiskManager;
pub use file_store::FilePageStore;
pub use memory_store::MemoryPageStore;
pub use page_store::{LockIntent, LockOwner, PageStore};
pub use stats::{PageStoreStats, StoreStatsSnapshot};
