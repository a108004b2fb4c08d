//! Index page: a fixed-capacity run of ordered entries plus tree linkage.

use std::cmp::Ordering;
use std::fmt;

use crate::common::config::{IndexConfig, PAGE_SIZE};
use crate::common::{Error, FileGroupId, IndexId, ObjectId, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

use super::entry::IndexEntry;
use super::key::IndexKey;

/// Role flags of an index page.
///
/// Root and Leaf combine: a single-page index is `ROOT | LEAF`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRole(u8);

impl PageRole {
    pub const ROOT: PageRole = PageRole(0x01);
    pub const INTERMEDIATE: PageRole = PageRole(0x02);
    pub const LEAF: PageRole = PageRole(0x04);

    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn from_bits(bits: u8) -> Self {
        PageRole(bits & 0x07)
    }

    #[inline]
    pub fn contains(self, other: PageRole) -> bool {
        self.0 & other.0 == other.0
    }

    /// Role of a page at `depth`, optionally the root.
    pub fn for_depth(depth: u8, root: bool) -> Self {
        let base = if depth == 0 {
            PageRole::LEAF
        } else {
            PageRole::INTERMEDIATE
        };
        if root {
            PageRole(base.0 | PageRole::ROOT.0)
        } else {
            base
        }
    }
}

impl fmt::Debug for PageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = Vec::new();
        if self.contains(PageRole::ROOT) {
            names.push("ROOT");
        }
        if self.contains(PageRole::INTERMEDIATE) {
            names.push("INTERMEDIATE");
        }
        if self.contains(PageRole::LEAF) {
            names.push("LEAF");
        }
        write!(f, "PageRole({})", names.join("|"))
    }
}

/// Fill-factor law.
///
/// True when the page is at capacity, or when its occupancy percentage has
/// reached the fill factor. A fill factor of 0 counts as 100.
///
/// # Example
/// ```
/// use blinkdex::index::needs_split;
///
/// assert!(needs_split(10, 10, 0));
/// assert!(!needs_split(9, 10, 0));
/// assert!(needs_split(9, 10, 90));
/// ```
pub fn needs_split(count: usize, max: usize, fill_factor: u8) -> bool {
    if max == 0 {
        return true;
    }
    let threshold = if fill_factor == 0 { 100 } else { fill_factor as usize };
    count == max || count * 100 / max >= threshold
}

/// Decoded index page.
///
/// # Layout (after the 13 byte [`PageHeader`])
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 13      1     role flags
/// 14      1     depth (0 = leaf)
/// 15      1     file group
/// 16      4     index id
/// 20      4     object id
/// 24      4     parent page (u32::MAX = none)
/// 28      4     prev page
/// 32      4     next page
/// 36      2     entry count
/// 38      2     reserved
/// 40      ...   entries, [key][page id] each, ascending by key
/// ```
#[derive(Debug, Clone)]
pub struct IndexPage<K> {
    page_id: PageId,
    role: PageRole,
    depth: u8,
    file_group: FileGroupId,
    index_id: IndexId,
    object_id: ObjectId,
    parent: Option<PageId>,
    prev: Option<PageId>,
    next: Option<PageId>,
    entries: Vec<IndexEntry<K>>,
    capacity: usize,
}

impl<K: IndexKey> IndexPage<K> {
    const OFFSET_ROLE: usize = PageHeader::SIZE;
    const OFFSET_DEPTH: usize = PageHeader::SIZE + 1;
    const OFFSET_FILE_GROUP: usize = PageHeader::SIZE + 2;
    const OFFSET_INDEX_ID: usize = PageHeader::SIZE + 3;
    const OFFSET_OBJECT_ID: usize = PageHeader::SIZE + 7;
    const OFFSET_PARENT: usize = PageHeader::SIZE + 11;
    const OFFSET_PREV: usize = PageHeader::SIZE + 15;
    const OFFSET_NEXT: usize = PageHeader::SIZE + 19;
    const OFFSET_COUNT: usize = PageHeader::SIZE + 23;

    /// First byte of the entry region.
    pub const DATA_OFFSET: usize = 40;

    /// Entries that fit in the data region of a page.
    pub const fn layout_capacity() -> usize {
        (PAGE_SIZE - Self::DATA_OFFSET) / IndexEntry::<K>::ENCODED_LEN
    }

    /// Layout capacity, clamped by the configuration.
    pub fn capacity_for(config: &IndexConfig) -> usize {
        let layout = Self::layout_capacity();
        match config.max_entries_per_page {
            Some(max) => layout.min(max as usize),
            None => layout,
        }
    }

    /// A fresh, empty page.
    pub fn new(
        page_id: PageId,
        index_id: IndexId,
        object_id: ObjectId,
        file_group: FileGroupId,
        depth: u8,
        root: bool,
        capacity: usize,
    ) -> Self {
        Self {
            page_id,
            role: PageRole::for_depth(depth, root),
            depth,
            file_group,
            index_id,
            object_id,
            parent: None,
            prev: None,
            next: None,
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    #[inline]
    pub fn role(&self) -> PageRole {
        self.role
    }

    #[inline]
    pub fn depth(&self) -> u8 {
        self.depth
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.depth == 0
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.role.contains(PageRole::ROOT)
    }

    #[inline]
    pub fn file_group(&self) -> FileGroupId {
        self.file_group
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
    pub fn parent(&self) -> Option<PageId> {
        self.parent
    }

    #[inline]
    pub fn prev(&self) -> Option<PageId> {
        self.prev
    }

    #[inline]
    pub fn next(&self) -> Option<PageId> {
        self.next
    }

    #[inline]
    pub fn entries(&self) -> &[IndexEntry<K>] {
        &self.entries
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// The separator: key of the first entry.
    pub fn first_key(&self) -> Option<&K> {
        self.entries.first().map(IndexEntry::key)
    }

    pub fn set_parent(&mut self, parent: Option<PageId>) {
        self.parent = parent;
    }

    pub fn set_prev(&mut self, prev: Option<PageId>) {
        self.prev = prev;
    }

    pub fn set_next(&mut self, next: Option<PageId>) {
        self.next = next;
    }

    /// Promote to or demote from the root role.
    pub fn set_root(&mut self, root: bool) {
        self.role = PageRole::for_depth(self.depth, root);
    }

    /// Whether this page should be split under `fill_factor`.
    ///
    /// Pages with fewer than two entries are never split.
    pub fn should_split(&self, fill_factor: u8) -> bool {
        self.entries.len() >= 2 && needs_split(self.entries.len(), self.capacity, fill_factor)
    }

    // ========================================================================
    // Entry operations
    // ========================================================================

    /// Compare the key stored at `ordinal` against `key`.
    ///
    /// Ordinals past the end compare as `Greater`, acting as an open upper
    /// bound.
    pub fn compare_entry(&self, ordinal: usize, key: &K) -> Ordering {
        match self.entries.get(ordinal) {
            Some(entry) => entry.key().cmp(key),
            None => Ordering::Greater,
        }
    }

    /// Data page of the entry at `ordinal`, for leaf pages only.
    pub fn try_get_leaf(&self, ordinal: usize) -> Option<PageId> {
        match self.entries.get(ordinal)? {
            IndexEntry::Leaf { data_page, .. } => Some(*data_page),
            IndexEntry::Link { .. } => None,
        }
    }

    /// Child page of the entry at `ordinal`, for non-leaf pages only.
    pub fn try_get_child_pointer(&self, ordinal: usize) -> Option<PageId> {
        match self.entries.get(ordinal)? {
            IndexEntry::Link { child, .. } => Some(*child),
            IndexEntry::Leaf { .. } => None,
        }
    }

    /// Link entry locating `child` in its parent.
    pub fn create_link_entry(child: &IndexPage<K>) -> Result<IndexEntry<K>> {
        let key = child.first_key().ok_or_else(|| {
            Error::structural(format!("cannot link empty {}", child.page_id))
        })?;
        Ok(IndexEntry::link(key.clone(), child.page_id))
    }

    /// An entry shaped for this page: leaf entries at depth 0, links above.
    pub fn create_entry(&self, key: K, pointer: PageId) -> IndexEntry<K> {
        if self.is_leaf() {
            IndexEntry::leaf(key, pointer)
        } else {
            IndexEntry::link(key, pointer)
        }
    }

    /// Insert an entry at its sorted position.
    ///
    /// Returns `true` when the entry became the first one, i.e. the page's
    /// separator changed.
    pub fn add_link(&mut self, entry: IndexEntry<K>) -> Result<bool> {
        let ordinal = match self
            .entries
            .binary_search_by(|existing| existing.key().cmp(entry.key()))
        {
            Ok(_) => return Err(Error::DuplicateKey(format!("{:?}", entry.key()))),
            Err(ordinal) => ordinal,
        };
        self.insert_entry(ordinal, entry)?;
        Ok(ordinal == 0)
    }

    /// Insert an entry at `ordinal`, which must keep the page sorted.
    pub fn insert_entry(&mut self, ordinal: usize, entry: IndexEntry<K>) -> Result<()> {
        if self.is_full() {
            return Err(Error::PageFull {
                page_id: self.page_id,
                capacity: self.capacity,
            });
        }
        if entry.is_leaf() != self.is_leaf() || ordinal > self.entries.len() {
            return Err(Error::structural(format!(
                "entry does not fit {} at ordinal {ordinal}",
                self.page_id
            )));
        }
        let prev = ordinal.checked_sub(1).map(|i| self.entries[i].key().cmp(entry.key()));
        let next = self.entries.get(ordinal).map(|e| e.key().cmp(entry.key()));
        if prev == Some(Ordering::Equal) || next == Some(Ordering::Equal) {
            return Err(Error::DuplicateKey(format!("{:?}", entry.key())));
        }
        if prev == Some(Ordering::Greater) || next == Some(Ordering::Less) {
            return Err(Error::structural(format!(
                "key {:?} out of order at {} ordinal {ordinal}",
                entry.key(),
                self.page_id
            )));
        }
        self.entries.insert(ordinal, entry);
        Ok(())
    }

    /// Append entries that all sort after the current last entry.
    pub fn append(&mut self, entries: Vec<IndexEntry<K>>) -> Result<()> {
        if self.entries.len() + entries.len() > self.capacity {
            return Err(Error::PageFull {
                page_id: self.page_id,
                capacity: self.capacity,
            });
        }
        for entry in entries {
            let ordinal = self.entries.len();
            self.insert_entry(ordinal, entry)?;
        }
        Ok(())
    }

    /// Detach and return entries `[at..]`.
    pub fn split_off(&mut self, at: usize) -> Vec<IndexEntry<K>> {
        self.entries.split_off(at)
    }

    /// Remove and return the entry at `ordinal`.
    pub fn remove_entry(&mut self, ordinal: usize) -> Option<IndexEntry<K>> {
        (ordinal < self.entries.len()).then(|| self.entries.remove(ordinal))
    }

    /// Overwrite the key at `ordinal`.
    pub fn set_entry_key(&mut self, ordinal: usize, key: K) {
        if let Some(entry) = self.entries.get_mut(ordinal) {
            entry.set_key(key);
        }
    }

    /// Point every link referencing `from` at `to`. Returns the number of
    /// rewritten entries.
    pub fn repoint_links(&mut self, from: PageId, to: PageId) -> usize {
        let mut rewritten = 0;
        for entry in &mut self.entries {
            if !entry.is_leaf() && entry.pointer() == from {
                entry.set_pointer(to);
                rewritten += 1;
            }
        }
        rewritten
    }

    /// Drop adjacent links that point at the same child, keeping the first.
    pub fn collapse_duplicate_links(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.dedup_by(|later, earlier| {
            !later.is_leaf() && later.pointer() == earlier.pointer()
        });
        before - self.entries.len()
    }

    /// Child pointers of a non-leaf page.
    pub fn children(&self) -> impl Iterator<Item = PageId> + '_ {
        self.entries
            .iter()
            .filter(|entry| !entry.is_leaf())
            .map(IndexEntry::pointer)
    }

    // ========================================================================
    // Codec
    // ========================================================================

    /// Serialize into a page image with a fresh checksum.
    pub fn encode(&self) -> Box<Page> {
        let mut page = Page::boxed();
        page.set_header(&PageHeader::new(PageType::Index));
        page.write_u8(Self::OFFSET_ROLE, self.role.bits());
        page.write_u8(Self::OFFSET_DEPTH, self.depth);
        page.write_u8(Self::OFFSET_FILE_GROUP, self.file_group.0);
        page.write_u32(Self::OFFSET_INDEX_ID, self.index_id.0);
        page.write_u32(Self::OFFSET_OBJECT_ID, self.object_id.0);
        page.write_u32(Self::OFFSET_PARENT, PageId::encode_link(self.parent));
        page.write_u32(Self::OFFSET_PREV, PageId::encode_link(self.prev));
        page.write_u32(Self::OFFSET_NEXT, PageId::encode_link(self.next));
        page.write_u16(Self::OFFSET_COUNT, self.entries.len() as u16);

        let width = IndexEntry::<K>::ENCODED_LEN;
        let data = page.as_mut_slice();
        for (i, entry) in self.entries.iter().enumerate() {
            let start = Self::DATA_OFFSET + i * width;
            entry.encode(&mut data[start..start + width]);
        }
        page.update_checksum();
        page
    }

    /// Deserialize, validating type, checksum, role and entry count.
    pub fn decode(page_id: PageId, page: &Page, capacity: usize) -> Result<Self> {
        let header = page.header();
        if header.page_type != PageType::Index {
            return Err(Error::UnexpectedPageType {
                page_id,
                found: header.page_type as u8,
            });
        }
        if !page.verify_checksum() {
            return Err(Error::ChecksumMismatch(page_id));
        }

        let role = PageRole::from_bits(page.read_u8(Self::OFFSET_ROLE));
        let depth = page.read_u8(Self::OFFSET_DEPTH);
        if role.contains(PageRole::LEAF) != (depth == 0) {
            return Err(Error::structural(format!(
                "{page_id} has role {role:?} at depth {depth}"
            )));
        }

        let count = page.read_u16(Self::OFFSET_COUNT) as usize;
        if count > Self::layout_capacity() {
            return Err(Error::structural(format!(
                "{page_id} claims {count} entries"
            )));
        }

        let width = IndexEntry::<K>::ENCODED_LEN;
        let data = page.as_slice();
        let entries = (0..count)
            .map(|i| {
                let start = Self::DATA_OFFSET + i * width;
                IndexEntry::decode(&data[start..start + width], depth == 0)
            })
            .collect::<Vec<_>>();

        Ok(Self {
            page_id,
            role,
            depth,
            file_group: FileGroupId(page.read_u8(Self::OFFSET_FILE_GROUP)),
            index_id: IndexId(page.read_u32(Self::OFFSET_INDEX_ID)),
            object_id: ObjectId(page.read_u32(Self::OFFSET_OBJECT_ID)),
            parent: PageId::decode_link(page.read_u32(Self::OFFSET_PARENT)),
            prev: PageId::decode_link(page.read_u32(Self::OFFSET_PREV)),
            next: PageId::decode_link(page.read_u32(Self::OFFSET_NEXT)),
            entries,
            capacity: capacity.max(count),
        })
    }
}
