//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a raw 4KB byte array that serves as the unit of I/O
//! between a page store and the index codecs. Typed page formats (index,
//! data, schema) are encoded into and decoded out of a `Page`.

use crate::common::config::PAGE_SIZE;

use super::page_header::PageHeader;

/// A page of data (4KB, 4KB-aligned).
///
/// # Clone Implementation
/// `Page` does NOT implement `Clone` in production code (copying 4KB should
/// be explicit, see [`Page::copy_from`]). A `#[cfg(test)]` Clone is provided
/// for tests.
///
/// # Example
/// ```
/// use blinkdex::storage::page::Page;
///
/// let mut page = Page::new();
/// page.write_u32(100, 0xDEAD_BEEF);
/// assert_eq!(page.read_u32(100), 0xDEAD_BEEF);
/// ```
#[cfg_attr(test, derive(Debug))]
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Create a new zeroed page on the heap.
    ///
    /// Stores pass pages around boxed so futures stay small.
    #[inline]
    pub fn boxed() -> Box<Self> {
        Box::new(Self::new())
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Overwrite this page with another page's bytes.
    #[inline]
    pub fn copy_from(&mut self, other: &Page) {
        self.data.copy_from_slice(&other.data);
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    /// Get the size of a page.
    #[inline]
    pub const fn size() -> usize {
        PAGE_SIZE
    }

    // ========================================================================
    // Little-endian field access
    // ========================================================================

    #[inline]
    pub fn read_u8(&self, offset: usize) -> u8 {
        self.data[offset]
    }

    #[inline]
    pub fn write_u8(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    #[inline]
    pub fn read_u16(&self, offset: usize) -> u16 {
        let mut bytes = [0u8; 2];
        bytes.copy_from_slice(&self.data[offset..offset + 2]);
        u16::from_le_bytes(bytes)
    }

    #[inline]
    pub fn write_u16(&mut self, offset: usize, value: u16) {
        self.data[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
    }

    #[inline]
    pub fn read_u32(&self, offset: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_le_bytes(bytes)
    }

    #[inline]
    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    // ========================================================================
    // Header and checksum
    // ========================================================================

    /// Read the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    /// Write a page header.
    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    /// Compute and store checksum in the header.
    ///
    /// Call this after all modifications to the page are complete.
    pub fn update_checksum(&mut self) {
        let checksum = PageHeader::compute_checksum(&self.data);
        self.write_u32(PageHeader::OFFSET_CHECKSUM, checksum);
    }

    /// Verify the page checksum is valid.
    pub fn verify_checksum(&self) -> bool {
        self.header().verify_checksum(&self.data)
    }

    /// True for a page that was allocated but never written.
    pub fn is_zeroed(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.copy_from(self);
        new_page
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::PageType;

    #[test]
    fn test_page_size_and_alignment() {
        assert_eq!(std::mem::size_of::<Page>(), PAGE_SIZE);
        assert_eq!(std::mem::align_of::<Page>(), 4096);
    }

    #[test]
    fn test_field_access() {
        let mut page = Page::new();
        page.write_u8(13, 0x7F);
        page.write_u16(14, 0xBEEF);
        page.write_u32(16, 0x0102_0304);

        assert_eq!(page.read_u8(13), 0x7F);
        assert_eq!(page.read_u16(14), 0xBEEF);
        assert_eq!(page.read_u32(16), 0x0102_0304);
        // little-endian on disk
        assert_eq!(page.as_slice()[16], 0x04);
    }

    #[test]
    fn test_checksum_roundtrip() {
        let mut page = Page::new();
        page.set_header(&PageHeader::new(PageType::Index));
        page.write_u32(200, 99);
        page.update_checksum();
        assert!(page.verify_checksum());

        page.write_u32(200, 100);
        assert!(!page.verify_checksum());
    }

    #[test]
    fn test_is_zeroed_and_reset() {
        let mut page = Page::new();
        assert!(page.is_zeroed());
        page.write_u8(4095, 1);
        assert!(!page.is_zeroed());
        page.reset();
        assert!(page.is_zeroed());
    }

    #[test]
    fn test_copy_from() {
        let mut a = Page::new();
        a.write_u32(0, 5);
        let mut b = Page::new();
        b.copy_from(&a);
        assert_eq!(b.read_u32(0), 5);
    }
}
