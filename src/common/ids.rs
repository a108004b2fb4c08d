//! Identifiers for indexes, owning objects and file groups.

use std::fmt;

/// Identifies one index within its owning object.
///
/// Assigned monotonically by the index manager, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexId(pub u32);

impl IndexId {
    /// Identifier handed to the first index of an object.
    pub const FIRST: IndexId = IndexId(1);

    /// The identifier after this one, or `None` once the space is used up.
    #[inline]
    pub fn next(self) -> Option<IndexId> {
        self.0.checked_add(1).map(IndexId)
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index({})", self.0)
    }
}

/// Identifies the object (table, stream, ...) that owns data pages and indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Object({})", self.0)
    }
}

/// Identifies the file group an index's pages are allocated from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileGroupId(pub u8);

impl FileGroupId {
    /// The primary file group.
    pub const PRIMARY: FileGroupId = FileGroupId(0);
}

impl fmt::Display for FileGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileGroup({})", self.0)
    }
}

/// Index sub-kind discriminator.
///
/// An object may carry at most one index of each sub-kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexSubKind(pub u8);

impl fmt::Display for IndexSubKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
