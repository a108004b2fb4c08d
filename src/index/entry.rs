//! Index entries: the ordered records stored in index pages.

use crate::common::PageId;

use super::key::IndexKey;

/// An ordered key plus the page it points at.
///
/// The shape follows the depth of the page holding it: leaf pages (depth 0)
/// hold [`IndexEntry::Leaf`], every other page holds [`IndexEntry::Link`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEntry<K> {
    /// Key plus the data page it indexes.
    Leaf { key: K, data_page: PageId },
    /// Key plus a child index page; the key equals the child's first key.
    Link { key: K, child: PageId },
}

impl<K: IndexKey> IndexEntry<K> {
    /// Encoded width: `[key][page id u32 LE]`.
    pub const ENCODED_LEN: usize = K::ENCODED_LEN + 4;

    #[inline]
    pub fn leaf(key: K, data_page: PageId) -> Self {
        IndexEntry::Leaf { key, data_page }
    }

    #[inline]
    pub fn link(key: K, child: PageId) -> Self {
        IndexEntry::Link { key, child }
    }

    #[inline]
    pub fn key(&self) -> &K {
        match self {
            IndexEntry::Leaf { key, .. } | IndexEntry::Link { key, .. } => key,
        }
    }

    /// Data page for leaf entries, child page for link entries.
    #[inline]
    pub fn pointer(&self) -> PageId {
        match self {
            IndexEntry::Leaf { data_page, .. } => *data_page,
            IndexEntry::Link { child, .. } => *child,
        }
    }

    /// Rewrite the key in place.
    pub fn set_key(&mut self, new_key: K) {
        match self {
            IndexEntry::Leaf { key, .. } | IndexEntry::Link { key, .. } => *key = new_key,
        }
    }

    /// Rewrite the payload pointer in place.
    pub fn set_pointer(&mut self, page_id: PageId) {
        match self {
            IndexEntry::Leaf { data_page, .. } => *data_page = page_id,
            IndexEntry::Link { child, .. } => *child = page_id,
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self, IndexEntry::Leaf { .. })
    }

    pub(crate) fn encode(&self, out: &mut [u8]) {
        self.key().encode(&mut out[..K::ENCODED_LEN]);
        out[K::ENCODED_LEN..Self::ENCODED_LEN].copy_from_slice(&self.pointer().0.to_le_bytes());
    }

    pub(crate) fn decode(bytes: &[u8], leaf: bool) -> Self {
        let key = K::decode(&bytes[..K::ENCODED_LEN]);
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[K::ENCODED_LEN..Self::ENCODED_LEN]);
        let pointer = PageId::new(u32::from_le_bytes(raw));
        if leaf {
            IndexEntry::leaf(key, pointer)
        } else {
            IndexEntry::link(key, pointer)
        }
    }
}
