//! Common types and utilities shared across blinkdex.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`IndexConfig`](config::IndexConfig)
//! - Error types
//! - Identifiers (PageId, IndexId, ObjectId, FileGroupId, IndexSubKind)

pub mod config;
pub mod error;
mod ids;
mod page_id;

pub use error::{Error, Result};
pub use ids::{FileGroupId, IndexId, IndexSubKind, ObjectId};
pub use page_id::PageId;
