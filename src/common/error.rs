//! Error types for blinkdex.

use std::time::Duration;

use thiserror::Error;

use super::ids::{IndexId, IndexSubKind, ObjectId};
use super::PageId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors raised by the index core and its page stores.
///
/// Every handler failure is delivered through the operation's returned
/// future. The manager never retries; retry/abort policy belongs to the
/// transaction layer above it.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist in the store.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// Stored CRC32 does not match the page contents.
    #[error("checksum mismatch on {0}")]
    ChecksumMismatch(PageId),

    /// A page was decoded as the wrong format.
    #[error("{page_id} has unexpected page type {found}")]
    UnexpectedPageType { page_id: PageId, found: u8 },

    /// The object already has an index of this sub-kind.
    ///
    /// Raised before any page I/O is performed.
    #[error("an index of sub-kind {0} is already defined")]
    DuplicateSubKind(IndexSubKind),

    /// No index identifier remains above the current maximum.
    #[error("index identifier space exhausted")]
    IdentifierSpaceExhausted,

    /// No index with this identifier is registered on the manager.
    #[error("{0} is not defined")]
    IndexNotFound(IndexId),

    /// The request names an object the manager does not own.
    #[error("{0} is not known to this manager")]
    UnknownObject(ObjectId),

    /// A page lock was not granted within the caller's bound.
    #[error("lock on {page_id} not acquired within {timeout:?}")]
    LockTimeout { page_id: PageId, timeout: Duration },

    /// Expected tree linkage was not found.
    ///
    /// This indicates concurrent corruption or a defect and is never retried.
    #[error("structural invariant violated: {0}")]
    StructuralInvariantViolation(String),

    /// The key is already present in the target page.
    #[error("duplicate index key {0}")]
    DuplicateKey(String),

    /// The page cannot take more entries.
    #[error("{page_id} is full ({capacity} entries)")]
    PageFull { page_id: PageId, capacity: usize },

    /// Fill factors are percentages in 0..=100.
    #[error("fill factor {0} is out of range (0..=100)")]
    InvalidFillFactor(u8),

    /// Pages must be able to hold at least two entries to split.
    #[error("page capacity {0} is below the minimum of 2 entries")]
    InvalidCapacity(u16),

    /// The object's schema page has no room for another index descriptor.
    #[error("schema page for {0} is full")]
    SchemaFull(ObjectId),
}

impl Error {
    /// Build a structural violation and log it.
    pub(crate) fn structural(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::error!(detail = %detail, "index.structural_violation");
        Error::StructuralInvariantViolation(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::PageNotFound(PageId::new(42));
        assert_eq!(format!("{}", err), "Page(42) not found");

        let err = Error::DuplicateSubKind(IndexSubKind(3));
        assert_eq!(format!("{}", err), "an index of sub-kind 3 is already defined");

        let err = Error::LockTimeout {
            page_id: PageId::new(7),
            timeout: Duration::from_millis(10),
        };
        assert_eq!(format!("{}", err), "lock on Page(7) not acquired within 10ms");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_structural_helper() {
        let err = Error::structural("missing child");
        assert!(matches!(
            err,
            Error::StructuralInvariantViolation(ref d) if d == "missing child"
        ));
    }
}
