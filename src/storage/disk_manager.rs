//! Disk Manager - low-level file I/O for database pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages
//! - Allocating pages, reusing freed ones first
//! - Returning pages to the free list
//! - Rediscovering pages by type when a file is reopened

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// The database is stored as a single file with pages laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Page N is located at file offset `N × PAGE_SIZE`. Deallocated pages keep
/// their slot and are stamped with [`PageType::Free`]; the free list is
/// rebuilt from those stamps on [`DiskManager::open`].
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The
/// [`FilePageStore`](crate::storage::FilePageStore) serializes access to it.
///
/// # Durability
/// All writes are followed by `fsync()`. Crash recovery is the job of the
/// write-ahead log beneath the store.
pub struct DiskManager {
    file: File,
    /// Number of pages in the file.
    page_count: u32,
    /// Slots available for reuse, most recently freed last.
    free_pages: Vec<PageId>,
}

impl DiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            page_count: 0,
            free_pages: Vec::new(),
        })
    }

    /// Open an existing database file and rebuild its free list.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be read.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        let mut dm = Self {
            file,
            page_count,
            free_pages: Vec::new(),
        };
        dm.free_pages = dm.pages_of_type(PageType::Free)?;
        Ok(dm)
    }

    /// Read a page from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page doesn't exist.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Box<Page>> {
        self.check_bounds(page_id)?;

        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        let mut page = Page::boxed();
        self.file.read_exact(page.as_mut_slice())?;

        Ok(page)
    }

    /// Write a page to disk.
    ///
    /// The page must have been previously allocated with `allocate_page()`.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.check_bounds(page_id)?;

        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(page.as_slice())?;
        self.file.sync_all()?;

        Ok(())
    }

    /// Allocate a page, reusing a freed slot when one exists.
    ///
    /// The returned page is zeroed on disk.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        if let Some(page_id) = self.free_pages.pop() {
            self.write_page(page_id, &Page::new())?;
            return Ok(page_id);
        }

        if self.page_count == u32::MAX {
            return Err(Error::structural("database file has no page ids left"));
        }
        let page_id = PageId::new(self.page_count);

        // Extend file with a zeroed page
        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        let zeros = [0u8; PAGE_SIZE];
        self.file.write_all(&zeros)?;
        self.file.sync_all()?;

        self.page_count += 1;
        Ok(page_id)
    }

    /// Stamp a page as free and make its slot available again.
    pub fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        self.check_bounds(page_id)?;
        if self.free_pages.contains(&page_id) {
            return Err(Error::PageNotFound(page_id));
        }

        let mut page = Page::new();
        page.set_header(&PageHeader::new(PageType::Free));
        page.update_checksum();
        self.write_page(page_id, &page)?;

        self.free_pages.push(page_id);
        Ok(())
    }

    /// Whether the page is on the free list.
    #[inline]
    pub fn is_free(&self, page_id: PageId) -> bool {
        self.free_pages.contains(&page_id)
    }

    /// Scan every page header and return the ids of pages of `page_type`.
    pub fn pages_of_type(&mut self, page_type: PageType) -> Result<Vec<PageId>> {
        let mut found = Vec::new();
        let mut header = [0u8; PageHeader::SIZE];
        for raw in 0..self.page_count {
            let page_id = PageId::new(raw);
            self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
            self.file.read_exact(&mut header)?;
            if PageHeader::from_bytes(&header).page_type == page_type {
                found.push(page_id);
            }
        }
        Ok(found)
    }

    /// Get the number of pages in the database.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Number of slots waiting on the free list.
    #[inline]
    pub fn free_page_count(&self) -> usize {
        self.free_pages.len()
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }

    fn check_bounds(&self, page_id: PageId) -> Result<()> {
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id));
        }
        Ok(())
    }

    #[inline]
    fn offset(page_id: PageId) -> u64 {
        (page_id.0 as u64) * (PAGE_SIZE as u64)
    }
}
