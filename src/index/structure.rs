//! Structural mutation: split, merge, root growth and collapse.

use std::future::Future;
use std::pin::Pin;

use crate::common::{Error, IndexId, PageId, Result};
use crate::storage::LockIntent;

use super::key::IndexKey;
use super::lock_scope::LockScope;
use super::manager::IndexManager;
use super::page::IndexPage;

type BoxedResult<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

impl<K: IndexKey> IndexManager<K> {
    /// Split `page` at its midpoint. Returns the updated left half and the
    /// new right half, both already saved.
    ///
    /// A root grows a new root above it first. A parent without room for
    /// the new link is split itself before anything on this level changes.
    pub(crate) async fn split_inner(
        &self,
        locks: &LockScope<'_>,
        index_id: IndexId,
        page: IndexPage<K>,
    ) -> Result<(IndexPage<K>, IndexPage<K>)> {
        if page.len() < 2 {
            return Err(Error::structural(format!(
                "cannot split {} holding {} entries",
                page.page_id(),
                page.len()
            )));
        }
        let info = self.require_info(index_id)?;
        let mut page = page;

        let (mut parent, grew_root) = if page.is_root() {
            let depth = page.depth().checked_add(1).ok_or_else(|| {
                Error::structural(format!("{index_id} cannot grow past depth {}", page.depth()))
            })?;
            (self.init_page(locks, &info, depth, true).await?, true)
        } else {
            let mut parent = self.load(locks, self.parent_of(&page)?, LockIntent::Exclusive).await?;
            if parent.is_full() {
                self.make_room(locks, index_id, parent).await?;
                // the parent split may have moved this page under the new half
                page = self.load(locks, page.page_id(), LockIntent::Exclusive).await?;
                parent = self.load(locks, self.parent_of(&page)?, LockIntent::Exclusive).await?;
            }
            (parent, false)
        };

        let old_next = page.next();
        let mut successor = match old_next {
            Some(next) => Some(self.load(locks, next, LockIntent::Exclusive).await?),
            None => None,
        };

        // populate and save the new page before anything points at it
        let mut right = self.init_page(locks, &info, page.depth(), false).await?;
        let mid = page.len() / 2;
        right.append(page.split_off(mid))?;
        right.set_parent(Some(parent.page_id()));
        right.set_prev(Some(page.page_id()));
        right.set_next(old_next);
        self.save(&right).await?;
        self.adopt_children(locks, &right).await?;

        if grew_root {
            // the new root is complete on disk before the old one is demoted
            page.set_root(false);
            page.set_parent(Some(parent.page_id()));
            parent.add_link(IndexPage::create_link_entry(&page)?)?;
            parent.add_link(IndexPage::create_link_entry(&right)?)?;
            self.save(&parent).await?;
        }

        if let Some(successor) = successor.as_mut() {
            successor.set_prev(Some(right.page_id()));
            self.save(successor).await?;
        }
        page.set_next(Some(right.page_id()));
        self.save(&page).await?;

        if grew_root {
            self.set_root(index_id, &parent).await?;
        } else {
            parent.add_link(IndexPage::create_link_entry(&right)?)?;
            self.save(&parent).await?;
        }

        tracing::debug!(
            target: "blinkdex::split",
            index = %index_id,
            left = %page.page_id(),
            right = %right.page_id(),
            parent = %parent.page_id(),
            depth = page.depth(),
            grew_root,
            "page split"
        );
        Ok((page, right))
    }

    /// Split a full parent so a child split can link into it.
    fn make_room<'a>(
        &'a self,
        locks: &'a LockScope<'a>,
        index_id: IndexId,
        parent: IndexPage<K>,
    ) -> BoxedResult<'a, ()> {
        Box::pin(async move {
            tracing::debug!(
                target: "blinkdex::split",
                index = %index_id,
                page = %parent.page_id(),
                "parent full, splitting upward"
            );
            self.split_inner(locks, index_id, parent).await.map(|_| ())
        })
    }

    /// Fold `absorbed` into `primary`, its left sibling.
    ///
    /// Links to the absorbed page are repointed at the primary page in
    /// `parent` and in the absorbed page's own parent. When the primary
    /// page ends up the only child of the root, it becomes the root.
    pub(crate) async fn merge_inner(
        &self,
        locks: &LockScope<'_>,
        index_id: IndexId,
        parent: Option<PageId>,
        primary_id: PageId,
        absorbed_id: PageId,
    ) -> Result<IndexPage<K>> {
        let mut primary = self.load(locks, primary_id, LockIntent::Exclusive).await?;
        let absorbed = self.load(locks, absorbed_id, LockIntent::Exclusive).await?;
        self.check_owner(index_id, &primary)?;
        self.check_owner(index_id, &absorbed)?;

        if primary.next() != Some(absorbed_id) {
            return Err(Error::structural(format!(
                "{absorbed_id} is not the right sibling of {primary_id}"
            )));
        }
        if primary.depth() != absorbed.depth() {
            return Err(Error::structural(format!(
                "cannot merge depth {} into depth {}",
                absorbed.depth(),
                primary.depth()
            )));
        }
        if primary.len() + absorbed.len() > primary.capacity() {
            return Err(Error::PageFull {
                page_id: primary_id,
                capacity: primary.capacity(),
            });
        }

        let mut parent_ids: Vec<PageId> = [parent, absorbed.parent(), primary.parent()]
            .into_iter()
            .flatten()
            .collect();
        parent_ids.sort();
        parent_ids.dedup();
        let mut parents = Vec::with_capacity(parent_ids.len());
        for parent_id in parent_ids {
            parents.push(self.load(locks, parent_id, LockIntent::Exclusive).await?);
        }
        let mut successor = match absorbed.next() {
            Some(next) => Some(self.load(locks, next, LockIntent::Exclusive).await?),
            None => None,
        };

        primary.append(absorbed.entries().to_vec())?;
        primary.set_next(absorbed.next());
        self.save(&primary).await?;
        self.adopt_children(locks, &primary).await?;

        if let Some(successor) = successor.as_mut() {
            successor.set_prev(Some(primary_id));
            self.save(successor).await?;
        }
        for parent in &mut parents {
            if parent.repoint_links(absorbed_id, primary_id) > 0 {
                parent.collapse_duplicate_links();
                self.save(parent).await?;
            }
        }
        self.store.deallocate_page(absorbed_id).await?;

        tracing::debug!(
            target: "blinkdex::merge",
            index = %index_id,
            survivor = %primary_id,
            removed = %absorbed_id,
            entries = primary.len(),
            "pages merged"
        );

        let old_root = parents
            .iter()
            .find(|p| Some(p.page_id()) == primary.parent() && p.is_root());
        if let Some(old_root) = old_root {
            if primary.prev().is_none() && primary.next().is_none() {
                if old_root.children().any(|child| child != primary_id) {
                    return Err(Error::structural(format!(
                        "root {} still links pages besides its only child {primary_id}",
                        old_root.page_id()
                    )));
                }
                let old_root_id = old_root.page_id();
                primary.set_root(true);
                primary.set_parent(None);
                self.save(&primary).await?;
                self.set_root(index_id, &primary).await?;
                self.store.deallocate_page(old_root_id).await?;
                tracing::debug!(
                    target: "blinkdex::merge",
                    index = %index_id,
                    root = %primary_id,
                    depth = primary.depth(),
                    "root collapsed one level"
                );
            }
        }
        Ok(primary)
    }

    /// Point the parent pointer of every child of `page` at `page`.
    async fn adopt_children(&self, locks: &LockScope<'_>, page: &IndexPage<K>) -> Result<()> {
        if page.is_leaf() {
            return Ok(());
        }
        for child_id in page.children() {
            let mut child = self.load(locks, child_id, LockIntent::Exclusive).await?;
            if child.parent() != Some(page.page_id()) {
                child.set_parent(Some(page.page_id()));
                self.save(&child).await?;
            }
        }
        Ok(())
    }

    fn parent_of(&self, page: &IndexPage<K>) -> Result<PageId> {
        page.parent().ok_or_else(|| {
            Error::structural(format!("non-root {} has no parent", page.page_id()))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::common::config::IndexConfig;
    use crate::common::{Error, FileGroupId, IndexId, IndexSubKind, ObjectId};
    use crate::index::{IndexManager, IndexPage, ObjectContext};
    use crate::storage::MemoryPageStore;

    async fn built(data_pages: usize, max_entries: u16) -> (Arc<MemoryPageStore>, IndexManager<i64>, IndexId) {
        let store = Arc::new(MemoryPageStore::new());
        store.create_object(ObjectId(1), FileGroupId::PRIMARY).unwrap();
        for _ in 0..data_pages {
            store.append_data_page(ObjectId(1)).unwrap();
        }
        let ctx = ObjectContext::strided(ObjectId(1), FileGroupId::PRIMARY, 10);
        let config = IndexConfig::default().with_max_entries_per_page(max_entries).unwrap();
        let manager = IndexManager::new(store.clone(), ctx, config);
        let index = manager
            .create_index("pk", FileGroupId::PRIMARY, IndexSubKind(0))
            .await
            .unwrap();
        (store, manager, index)
    }

    fn keys(page: &IndexPage<i64>) -> Vec<i64> {
        page.entries().iter().map(|e| *e.key()).collect()
    }

    #[tokio::test]
    async fn test_split_root_leaf_grows_tree() {
        let (_store, manager, index) = built(4, 8).await;
        let root_id = manager.root_info(index).unwrap().root_page();

        let (left_id, right_id) = manager.split_page(index, root_id).await.unwrap();
        assert_eq!(left_id, root_id);

        let info = manager.root_info(index).unwrap();
        assert_eq!(info.root_depth(), 1);
        let root = manager.read_page(info.root_page()).await.unwrap();
        let left = manager.read_page(left_id).await.unwrap();
        let right = manager.read_page(right_id).await.unwrap();

        assert_eq!(keys(&left), vec![0, 10]);
        assert_eq!(keys(&right), vec![20, 30]);
        assert!(!left.is_root());
        assert_eq!(keys(&root), vec![0, 20]);
        assert_eq!(root.children().collect::<Vec<_>>(), vec![left_id, right_id]);
        assert_eq!(left.next(), Some(right_id));
        assert_eq!(right.prev(), Some(left_id));
        assert_eq!(right.parent(), Some(root.page_id()));
    }

    #[tokio::test]
    async fn test_split_rewires_old_successor() {
        let (_store, manager, index) = built(6, 3).await;
        // leaves [0,10,20] [30,40,50] under one root
        let root = manager
            .read_page(manager.root_info(index).unwrap().root_page())
            .await
            .unwrap();
        let first = root.try_get_child_pointer(0).unwrap();
        let second = root.try_get_child_pointer(1).unwrap();

        let (_, middle) = manager.split_page(index, first).await.unwrap();

        let middle_page = manager.read_page(middle).await.unwrap();
        let second_page = manager.read_page(second).await.unwrap();
        assert_eq!(keys(&middle_page), vec![10, 20]);
        assert_eq!(middle_page.next(), Some(second));
        assert_eq!(second_page.prev(), Some(middle));

        let root = manager.read_page(root.page_id()).await.unwrap();
        assert_eq!(keys(&root), vec![0, 10, 30]);
    }

    #[tokio::test]
    async fn test_split_with_full_parent_splits_upward() {
        let (_store, manager, index) = built(9, 3).await;
        // root [0,30,60] is full; splitting a leaf must split the root first
        let root_id = manager.root_info(index).unwrap().root_page();
        let root = manager.read_page(root_id).await.unwrap();
        let last_leaf = root.try_get_child_pointer(2).unwrap();

        let (_, right) = manager.split_page(index, last_leaf).await.unwrap();

        let info = manager.root_info(index).unwrap();
        assert_eq!(info.root_depth(), 2);
        let right_page = manager.read_page(right).await.unwrap();
        let parent = manager.read_page(right_page.parent().unwrap()).await.unwrap();
        assert_eq!(keys(&parent), vec![30, 60, 70]);
        assert!(parent.children().any(|c| c == last_leaf));

        let mut all = Vec::new();
        manager
            .enumerate(index, &0, &100, |_, e, _| {
                all.push(*e.key());
                true
            })
            .await
            .unwrap();
        assert_eq!(all, vec![0, 10, 20, 30, 40, 50, 60, 70, 80]);
    }

    #[tokio::test]
    async fn test_split_single_entry_page_fails() {
        let (_store, manager, index) = built(1, 4).await;
        let root_id = manager.root_info(index).unwrap().root_page();
        assert!(matches!(
            manager.split_page(index, root_id).await,
            Err(Error::StructuralInvariantViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_merge_rejects_overflow() {
        let (_store, manager, index) = built(4, 3).await;
        // leaves [0,10,20] [30] under a root
        let root_id = manager.root_info(index).unwrap().root_page();
        let root = manager.read_page(root_id).await.unwrap();
        let left = root.try_get_child_pointer(0).unwrap();
        let right = root.try_get_child_pointer(1).unwrap();

        // four entries do not fit a three-entry page
        assert!(matches!(
            manager.merge_pages(index, Some(root_id), left, right).await,
            Err(Error::PageFull { .. })
        ));
        assert_eq!(manager.read_page(right).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_merge_collapses_root() {
        let (store, manager, index) = built(4, 4).await;
        let root_id = manager.root_info(index).unwrap().root_page();
        let (left, right) = manager.split_page(index, root_id).await.unwrap();
        let new_root = manager.root_info(index).unwrap().root_page();

        manager
            .merge_pages(index, Some(new_root), left, right)
            .await
            .unwrap();

        let info = manager.root_info(index).unwrap();
        assert_eq!(info.root_page(), left);
        assert_eq!(info.root_depth(), 0);
        assert!(!store.contains_page(right));
        assert!(!store.contains_page(new_root));

        let merged = manager.read_page(left).await.unwrap();
        assert!(merged.is_root() && merged.is_leaf());
        assert_eq!(merged.parent(), None);
        assert_eq!(keys(&merged), vec![0, 10, 20, 30]);
    }

    #[tokio::test]
    async fn test_merge_requires_adjacent_pages() {
        let (_store, manager, index) = built(9, 3).await;
        let root = manager
            .read_page(manager.root_info(index).unwrap().root_page())
            .await
            .unwrap();
        let first = root.try_get_child_pointer(0).unwrap();
        let third = root.try_get_child_pointer(2).unwrap();

        assert!(matches!(
            manager.merge_pages(index, None, first, third).await,
            Err(Error::StructuralInvariantViolation(_))
        ));
        assert!(matches!(
            manager.merge_pages(index, None, root.page_id(), first).await,
            Err(Error::StructuralInvariantViolation(_))
        ));
    }
}
