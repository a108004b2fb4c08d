//! Configuration for blinkdex.
//!
//! Layout constants are compile-time; per-manager tuning lives in
//! [`IndexConfig`].

use std::time::Duration;

use crate::common::{Error, Result};

/// Size of a page in bytes (4KB).
///
/// This value is chosen to match:
/// - OS page size on most systems (4096 bytes)
/// - Common database page sizes
///
/// # Memory Layout
/// With 4KB pages and 32-bit PageIds:
/// - Max pages: 2^32 - 1 (u32::MAX is reserved as the "no page" sentinel)
/// - Max database size: ~16TB
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of addressable pages with u32 PageId.
pub const MAX_PAGES: u64 = u32::MAX as u64;

/// Fill factor given to new indexes when none is requested.
pub const DEFAULT_FILL_FACTOR: u8 = 90;

/// How long a page load waits for a contended page lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Index names are stored in a fixed 16 byte field.
pub const MAX_INDEX_NAME_LEN: usize = 16;

/// Runtime settings for an [`IndexManager`](crate::index::IndexManager).
///
/// # Example
/// ```
/// use std::time::Duration;
/// use blinkdex::IndexConfig;
///
/// let config = IndexConfig::default()
///     .with_fill_factor(75)
///     .unwrap()
///     .with_lock_timeout(Duration::from_millis(200));
/// assert_eq!(config.fill_factor, 75);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexConfig {
    /// Fill factor recorded for newly created indexes (0 means 100%).
    pub fill_factor: u8,

    /// Optional clamp on the layout-derived page capacity.
    pub max_entries_per_page: Option<u16>,

    /// Bound on page lock acquisition during loads.
    pub lock_timeout: Duration,
}

impl IndexConfig {
    /// Set the fill factor, rejecting values above 100.
    pub fn with_fill_factor(mut self, fill_factor: u8) -> Result<Self> {
        validate_fill_factor(fill_factor)?;
        self.fill_factor = fill_factor;
        Ok(self)
    }

    /// Clamp page capacity to at most `max` entries.
    ///
    /// # Errors
    /// `InvalidCapacity` if `max < 2`; a page holding a single entry can
    /// never split.
    pub fn with_max_entries_per_page(mut self, max: u16) -> Result<Self> {
        if max < 2 {
            return Err(Error::InvalidCapacity(max));
        }
        self.max_entries_per_page = Some(max);
        Ok(self)
    }

    /// Set the page lock timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            fill_factor: DEFAULT_FILL_FACTOR,
            max_entries_per_page: None,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

/// Fill factors are percentages; 0 is accepted and means "split when full".
pub fn validate_fill_factor(fill_factor: u8) -> Result<()> {
    if fill_factor > 100 {
        return Err(Error::InvalidFillFactor(fill_factor));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_default_config() {
        let config = IndexConfig::default();
        assert_eq!(config.fill_factor, DEFAULT_FILL_FACTOR);
        assert_eq!(config.max_entries_per_page, None);
        assert_eq!(config.lock_timeout, DEFAULT_LOCK_TIMEOUT);
    }

    #[test]
    fn test_fill_factor_bounds() {
        assert!(IndexConfig::default().with_fill_factor(0).is_ok());
        assert!(IndexConfig::default().with_fill_factor(100).is_ok());
        assert!(matches!(
            IndexConfig::default().with_fill_factor(101),
            Err(Error::InvalidFillFactor(101))
        ));
    }

    #[test]
    fn test_max_entries_too_small() {
        assert!(matches!(
            IndexConfig::default().with_max_entries_per_page(1),
            Err(Error::InvalidCapacity(1))
        ));
        assert!(matches!(
            IndexConfig::default().with_max_entries_per_page(0),
            Err(Error::InvalidCapacity(0))
        ));
        let config = IndexConfig::default().with_max_entries_per_page(2).unwrap();
        assert_eq!(config.max_entries_per_page, Some(2));
    }
}
