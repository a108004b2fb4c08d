//! Persistent per-index descriptor.

use crate::common::config::MAX_INDEX_NAME_LEN;
use crate::common::{FileGroupId, IndexId, IndexSubKind, ObjectId, PageId};

/// Identity and current root location of one index.
///
/// # Layout (32 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     index_id
/// 4       4     object_id
/// 8       1     file_group
/// 9       1     sub_kind
/// 10      16    name (UTF-8, zero padded)
/// 26      4     root page (u32::MAX = none)
/// 30      1     root depth
/// 31      1     fill factor (0 = 100%)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootIndexInfo {
    index_id: IndexId,
    object_id: ObjectId,
    file_group: FileGroupId,
    sub_kind: IndexSubKind,
    name: String,
    root_page: PageId,
    root_depth: u8,
    fill_factor: u8,
}

impl RootIndexInfo {
    pub const ENCODED_LEN: usize = 32;

    const OFFSET_INDEX_ID: usize = 0;
    const OFFSET_OBJECT_ID: usize = 4;
    const OFFSET_FILE_GROUP: usize = 8;
    const OFFSET_SUB_KIND: usize = 9;
    const OFFSET_NAME: usize = 10;
    const OFFSET_ROOT: usize = 26;
    const OFFSET_DEPTH: usize = 30;
    const OFFSET_FILL_FACTOR: usize = 31;

    /// A descriptor with no root yet. Names longer than 16 bytes are cut at
    /// the last character boundary that fits.
    pub fn new(
        index_id: IndexId,
        object_id: ObjectId,
        file_group: FileGroupId,
        sub_kind: IndexSubKind,
        name: &str,
        fill_factor: u8,
    ) -> Self {
        Self {
            index_id,
            object_id,
            file_group,
            sub_kind,
            name: truncate_name(name).to_owned(),
            root_page: PageId::INVALID,
            root_depth: 0,
            fill_factor,
        }
    }

    #[inline]
    pub fn index_id(&self) -> IndexId {
        self.index_id
    }

    #[inline]
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    #[inline]
    pub fn file_group(&self) -> FileGroupId {
        self.file_group
    }

    #[inline]
    pub fn sub_kind(&self) -> IndexSubKind {
        self.sub_kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn root_page(&self) -> PageId {
        self.root_page
    }

    #[inline]
    pub fn root_depth(&self) -> u8 {
        self.root_depth
    }

    /// Stored fill factor; 0 means 100.
    #[inline]
    pub fn fill_factor(&self) -> u8 {
        self.fill_factor
    }

    /// Fill factor with 0 mapped to 100.
    #[inline]
    pub fn effective_fill_factor(&self) -> u8 {
        if self.fill_factor == 0 {
            100
        } else {
            self.fill_factor
        }
    }

    /// Point the descriptor at a new root.
    pub fn set_root(&mut self, root_page: PageId, root_depth: u8) {
        self.root_page = root_page;
        self.root_depth = root_depth;
    }

    pub(crate) fn set_file_group(&mut self, file_group: FileGroupId) {
        self.file_group = file_group;
    }

    pub fn encode(&self, out: &mut [u8]) {
        let out = &mut out[..Self::ENCODED_LEN];
        out.fill(0);
        out[Self::OFFSET_INDEX_ID..Self::OFFSET_INDEX_ID + 4]
            .copy_from_slice(&self.index_id.0.to_le_bytes());
        out[Self::OFFSET_OBJECT_ID..Self::OFFSET_OBJECT_ID + 4]
            .copy_from_slice(&self.object_id.0.to_le_bytes());
        out[Self::OFFSET_FILE_GROUP] = self.file_group.0;
        out[Self::OFFSET_SUB_KIND] = self.sub_kind.0;
        let name = self.name.as_bytes();
        out[Self::OFFSET_NAME..Self::OFFSET_NAME + name.len()].copy_from_slice(name);
        out[Self::OFFSET_ROOT..Self::OFFSET_ROOT + 4]
            .copy_from_slice(&self.root_page.0.to_le_bytes());
        out[Self::OFFSET_DEPTH] = self.root_depth;
        out[Self::OFFSET_FILL_FACTOR] = self.fill_factor;
    }

    pub fn decode(bytes: &[u8]) -> Self {
        let u32_at = |offset: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes[offset..offset + 4]);
            u32::from_le_bytes(raw)
        };
        let name_field = &bytes[Self::OFFSET_NAME..Self::OFFSET_NAME + MAX_INDEX_NAME_LEN];
        let name_len = name_field.iter().position(|&b| b == 0).unwrap_or(MAX_INDEX_NAME_LEN);

        Self {
            index_id: IndexId(u32_at(Self::OFFSET_INDEX_ID)),
            object_id: ObjectId(u32_at(Self::OFFSET_OBJECT_ID)),
            file_group: FileGroupId(bytes[Self::OFFSET_FILE_GROUP]),
            sub_kind: IndexSubKind(bytes[Self::OFFSET_SUB_KIND]),
            name: String::from_utf8_lossy(&name_field[..name_len]).into_owned(),
            root_page: PageId::new(u32_at(Self::OFFSET_ROOT)),
            root_depth: bytes[Self::OFFSET_DEPTH],
            fill_factor: bytes[Self::OFFSET_FILL_FACTOR],
        }
    }
}

fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_INDEX_NAME_LEN {
        return name;
    }
    let mut end = MAX_INDEX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
