//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - The raw 4KB data container
//! - [`PageHeader`] - Metadata at the start of every page
//! - [`PageType`] - Discriminator for different page formats
//! - [`DataPageHeader`] - Chain linkage of object data pages
//! - [`SchemaPage`] - Per-object index descriptor catalog
//!
//! The index page format lives with the index code in
//! [`crate::index::IndexPage`].

mod data_page;
#[allow(clippy::module_inception)]
mod page;
mod page_header;
mod schema_page;

pub use data_page::DataPageHeader;
pub use page::Page;
pub use page_header::{PageHeader, PageType};
pub use schema_page::SchemaPage;
