//! Explicit per-object context handed to an index manager.

use std::fmt;
use std::sync::Arc;

use crate::common::{FileGroupId, ObjectId};

use super::key::IndexKey;

type KeyFn<K> = Arc<dyn Fn(u64) -> K + Send + Sync>;

/// The object an [`IndexManager`](super::IndexManager) serves.
///
/// Carries the object identity, the file group new index pages default to,
/// and the function that maps a data page's ordinal in the object's chain to
/// the key it is indexed under during a bulk rebuild.
#[derive(Clone)]
pub struct ObjectContext<K> {
    object_id: ObjectId,
    file_group: FileGroupId,
    key_for: KeyFn<K>,
}

impl<K: IndexKey> ObjectContext<K> {
    pub fn new<F>(object_id: ObjectId, file_group: FileGroupId, key_for: F) -> Self
    where
        F: Fn(u64) -> K + Send + Sync + 'static,
    {
        Self {
            object_id,
            file_group,
            key_for: Arc::new(key_for),
        }
    }

    #[inline]
    pub fn object_id(&self) -> ObjectId {
        self.object_id
    }

    #[inline]
    pub fn file_group(&self) -> FileGroupId {
        self.file_group
    }

    /// Key of the data page at `ordinal` (0-based) in the object's chain.
    #[inline]
    pub fn key_for(&self, ordinal: u64) -> K {
        (self.key_for)(ordinal)
    }
}

impl ObjectContext<i64> {
    /// Keys `0, stride, 2*stride, ...` in chain order.
    ///
    /// # Example
    /// ```
    /// use blinkdex::{FileGroupId, ObjectContext, ObjectId};
    ///
    /// let ctx = ObjectContext::strided(ObjectId(1), FileGroupId::PRIMARY, 10);
    /// assert_eq!(ctx.key_for(3), 30);
    /// ```
    pub fn strided(object_id: ObjectId, file_group: FileGroupId, stride: i64) -> Self {
        Self::new(object_id, file_group, move |ordinal| {
            (ordinal as i64).wrapping_mul(stride)
        })
    }
}

impl<K> fmt::Debug for ObjectContext<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectContext")
            .field("object_id", &self.object_id)
            .field("file_group", &self.file_group)
            .finish_non_exhaustive()
    }
}
