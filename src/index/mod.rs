//! B-link tree index core.
//!
//! # Architecture
//! ```text
//! IndexManager<K> ──► Pipeline (exclusive | concurrent lane)
//!       │
//!       ├─ rebuild   create + bottom-up bulk build
//!       ├─ search    crab search, insert, range enumeration
//!       └─ structure split, merge, root growth/collapse
//!                 │
//!                 ▼
//!          IndexPage<K> ◄─► Page (PAGE_SIZE bytes via PageStore)
//! ```
//!
//! Pages at one depth form a doubly linked sibling chain. Every link entry
//! carries a separator no greater than the first key of its child, so a
//! search that lands left of its key can always recover by moving right.

mod context;
mod entry;
mod key;
mod lock_scope;
mod manager;
mod page;
mod pipeline;
mod rebuild;
mod root_info;
mod search;
mod structure;

pub use context::ObjectContext;
pub use entry::IndexEntry;
pub use key::IndexKey;
pub use manager::IndexManager;
pub use page::{needs_split, IndexPage, PageRole};
pub use pipeline::{Lane, Pipeline};
pub use root_info::RootIndexInfo;
pub use search::{Landing, SearchResult};
