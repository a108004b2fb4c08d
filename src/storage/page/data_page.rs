//! Object data page header.
//!
//! Data pages belong to the surrounding storage engine; the index core only
//! needs their chain linkage to drive a bulk rebuild. The row/sample codec of
//! the data region is out of scope here.

use crate::common::{Error, ObjectId, PageId, Result};

use super::{Page, PageHeader, PageType};

/// Chain linkage stored in every object data page.
///
/// # Layout (after the 13 byte [`PageHeader`])
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 13      4     object_id
/// 17      4     prev page (u32::MAX = none)
/// 21      4     next page (u32::MAX = none)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPageHeader {
    pub object_id: ObjectId,
    pub prev: Option<PageId>,
    pub next: Option<PageId>,
}

impl DataPageHeader {
    const OFFSET_OBJECT_ID: usize = PageHeader::SIZE;
    const OFFSET_PREV: usize = PageHeader::SIZE + 4;
    const OFFSET_NEXT: usize = PageHeader::SIZE + 8;

    /// First byte of the data region.
    pub const DATA_OFFSET: usize = PageHeader::SIZE + 12;

    pub fn new(object_id: ObjectId) -> Self {
        Self {
            object_id,
            prev: None,
            next: None,
        }
    }

    /// Write the linkage (and a fresh checksum) into `page`.
    pub fn write_to(&self, page: &mut Page) {
        page.set_header(&PageHeader::new(PageType::Data));
        page.write_u32(Self::OFFSET_OBJECT_ID, self.object_id.0);
        page.write_u32(Self::OFFSET_PREV, PageId::encode_link(self.prev));
        page.write_u32(Self::OFFSET_NEXT, PageId::encode_link(self.next));
        page.update_checksum();
    }

    /// Read the linkage from a data page.
    pub fn read_from(page_id: PageId, page: &Page) -> Result<Self> {
        let header = page.header();
        if header.page_type != PageType::Data {
            return Err(Error::UnexpectedPageType {
                page_id,
                found: header.page_type as u8,
            });
        }
        Ok(Self {
            object_id: ObjectId(page.read_u32(Self::OFFSET_OBJECT_ID)),
            prev: PageId::decode_link(page.read_u32(Self::OFFSET_PREV)),
            next: PageId::decode_link(page.read_u32(Self::OFFSET_NEXT)),
        })
    }
}
