//! Page identifier type.

use std::fmt;

/// Identifies a page in a page store.
///
/// Using `u32` allows for 4 billion pages. `u32::MAX` is reserved as the
/// on-disk encoding of "no page"; in memory, optional links are modelled as
/// `Option<PageId>` and converted at the codec boundary with
/// [`PageId::encode_link`] / [`PageId::decode_link`].
///
/// # Example
/// ```
/// use blinkdex::PageId;
///
/// let page_id = PageId::new(42);
/// assert!(page_id.is_valid());
/// assert_eq!(PageId::decode_link(PageId::encode_link(None)), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u32);

impl PageId {
    /// Invalid/sentinel page ID.
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Create a new PageId.
    #[inline]
    pub fn new(id: u32) -> Self {
        PageId(id)
    }

    /// Check if this page ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Raw value written for an optional page link.
    #[inline]
    pub fn encode_link(link: Option<PageId>) -> u32 {
        link.unwrap_or(Self::INVALID).0
    }

    /// Optional page link read back from its raw value.
    #[inline]
    pub fn decode_link(raw: u32) -> Option<PageId> {
        let page_id = PageId(raw);
        page_id.is_valid().then_some(page_id)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Page(INVALID)")
        } else {
            write!(f, "Page({})", self.0)
        }
    }
}
