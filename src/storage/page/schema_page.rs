//! Per-object schema page.
//!
//! The schema page is where an object's index descriptors are persisted, so
//! a manager can be reopened with its registry intact. It also records the
//! head and tail of the object's data-page chain.

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, FileGroupId, ObjectId, PageId, Result};
use crate::index::RootIndexInfo;

use super::{Page, PageHeader, PageType};

/// Decoded contents of a schema page.
///
/// # Layout (after the 13 byte [`PageHeader`])
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 13      4     object_id
/// 17      1     file_group
/// 18      4     first data page (u32::MAX = none)
/// 22      4     last data page (u32::MAX = none)
/// 26      2     descriptor count
/// 28      32*n  RootIndexInfo records
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPage {
    pub object_id: ObjectId,
    pub file_group: FileGroupId,
    pub first_data_page: Option<PageId>,
    pub last_data_page: Option<PageId>,
    pub indexes: Vec<RootIndexInfo>,
}

impl SchemaPage {
    const OFFSET_OBJECT_ID: usize = PageHeader::SIZE;
    const OFFSET_FILE_GROUP: usize = PageHeader::SIZE + 4;
    const OFFSET_FIRST: usize = PageHeader::SIZE + 5;
    const OFFSET_LAST: usize = PageHeader::SIZE + 9;
    const OFFSET_COUNT: usize = PageHeader::SIZE + 13;
    const OFFSET_RECORDS: usize = PageHeader::SIZE + 15;

    /// Number of index descriptors a schema page can carry.
    pub const MAX_INDEXES: usize = (PAGE_SIZE - Self::OFFSET_RECORDS) / RootIndexInfo::ENCODED_LEN;

    pub fn new(object_id: ObjectId, file_group: FileGroupId) -> Self {
        Self {
            object_id,
            file_group,
            first_data_page: None,
            last_data_page: None,
            indexes: Vec::new(),
        }
    }

    /// Insert or replace the descriptor with the same index id.
    pub fn upsert_index(&mut self, info: &RootIndexInfo) -> Result<()> {
        if let Some(existing) = self
            .indexes
            .iter_mut()
            .find(|i| i.index_id() == info.index_id())
        {
            *existing = info.clone();
            return Ok(());
        }
        if self.indexes.len() >= Self::MAX_INDEXES {
            return Err(Error::SchemaFull(self.object_id));
        }
        self.indexes.push(info.clone());
        Ok(())
    }

    pub fn write_to(&self, page: &mut Page) {
        page.reset();
        page.set_header(&PageHeader::new(PageType::Schema));
        page.write_u32(Self::OFFSET_OBJECT_ID, self.object_id.0);
        page.write_u8(Self::OFFSET_FILE_GROUP, self.file_group.0);
        page.write_u32(Self::OFFSET_FIRST, PageId::encode_link(self.first_data_page));
        page.write_u32(Self::OFFSET_LAST, PageId::encode_link(self.last_data_page));
        page.write_u16(Self::OFFSET_COUNT, self.indexes.len() as u16);
        for (i, info) in self.indexes.iter().enumerate() {
            let start = Self::OFFSET_RECORDS + i * RootIndexInfo::ENCODED_LEN;
            info.encode(&mut page.as_mut_slice()[start..start + RootIndexInfo::ENCODED_LEN]);
        }
        page.update_checksum();
    }

    pub fn read_from(page_id: PageId, page: &Page) -> Result<Self> {
        let header = page.header();
        if header.page_type != PageType::Schema {
            return Err(Error::UnexpectedPageType {
                page_id,
                found: header.page_type as u8,
            });
        }
        let count = page.read_u16(Self::OFFSET_COUNT) as usize;
        if count > Self::MAX_INDEXES {
            return Err(Error::structural(format!(
                "schema {page_id} claims {count} index descriptors"
            )));
        }
        let indexes = (0..count)
            .map(|i| {
                let start = Self::OFFSET_RECORDS + i * RootIndexInfo::ENCODED_LEN;
                RootIndexInfo::decode(&page.as_slice()[start..start + RootIndexInfo::ENCODED_LEN])
            })
            .collect();

        Ok(Self {
            object_id: ObjectId(page.read_u32(Self::OFFSET_OBJECT_ID)),
            file_group: FileGroupId(page.read_u8(Self::OFFSET_FILE_GROUP)),
            first_data_page: PageId::decode_link(page.read_u32(Self::OFFSET_FIRST)),
            last_data_page: PageId::decode_link(page.read_u32(Self::OFFSET_LAST)),
            indexes,
        })
    }
}
