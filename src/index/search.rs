//! Crab search, insert and range enumeration.

use crate::common::{Error, IndexId, PageId, Result};
use crate::storage::LockIntent;

use super::entry::IndexEntry;
use super::key::IndexKey;
use super::lock_scope::LockScope;
use super::manager::IndexManager;
use super::page::IndexPage;

/// Where a search came to rest on its leaf page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    /// `entry[i].key <= key`, and the next entry (possibly on the next
    /// page) is greater than `key`.
    At(usize),
    /// `key` sorts before every entry of the page.
    BeforeFirst,
    /// The leaf has no entries.
    Empty,
}

/// Leaf page and position reached by a crab search.
#[derive(Debug, Clone)]
pub struct SearchResult<K> {
    page: IndexPage<K>,
    landing: Landing,
}

impl<K: IndexKey> SearchResult<K> {
    pub fn page(&self) -> &IndexPage<K> {
        &self.page
    }

    pub fn into_page(self) -> IndexPage<K> {
        self.page
    }

    pub fn landing(&self) -> Landing {
        self.landing
    }

    /// The straddle entry, if the search landed on one.
    pub fn entry(&self) -> Option<&IndexEntry<K>> {
        match self.landing {
            Landing::At(ordinal) => self.page.entries().get(ordinal),
            Landing::BeforeFirst | Landing::Empty => None,
        }
    }

    /// The straddle entry when its key equals `key`.
    pub fn exact(&self, key: &K) -> Option<&IndexEntry<K>> {
        self.entry().filter(|entry| entry.key() == key)
    }
}

/// Outcome of examining one page during descent.
enum Step<K> {
    Land(Landing),
    Descend(PageId),
    MoveRight(IndexPage<K>),
}

impl<K: IndexKey> IndexManager<K> {
    /// Descend from the root to the leaf whose range holds `key`.
    pub(crate) async fn find_inner(
        &self,
        locks: &LockScope<'_>,
        index_id: IndexId,
        key: &K,
        for_insert: bool,
    ) -> Result<SearchResult<K>> {
        let info = self.require_info(index_id)?;
        let intent = if for_insert {
            LockIntent::Exclusive
        } else {
            LockIntent::Shared
        };

        let mut page = self.load(locks, info.root_page(), intent).await?;
        let mut fresh_root = false;
        loop {
            let mut successor = None;
            if for_insert && !fresh_root && page.should_split(info.fill_factor()) {
                let grew_root = page.is_root();
                let (left, right) = self.split_inner(locks, index_id, page).await?;
                if grew_root {
                    // restart one level up so the new root's separators are
                    // examined too; it is not split again on this pass
                    let root = left.parent().ok_or_else(|| {
                        Error::structural(format!("split root {} has no parent", left.page_id()))
                    })?;
                    page = self.load(locks, root, intent).await?;
                    fresh_root = true;
                    continue;
                }
                page = left;
                successor = Some(right);
            }
            fresh_root = false;

            match self.step(locks, &mut page, successor, key, for_insert, intent).await? {
                Step::Land(landing) => return Ok(SearchResult { page, landing }),
                Step::Descend(child) => {
                    page = self.load(locks, child, intent).await?;
                }
                Step::MoveRight(next) => {
                    tracing::debug!(
                        target: "blinkdex::search",
                        from = %page.page_id(),
                        to = %next.page_id(),
                        "moved right"
                    );
                    page = next;
                }
            }
        }
    }

    /// Locate the straddle ordinal on `page` and decide where to go next.
    ///
    /// `successor` is the right half of a split just performed on `page`;
    /// without one, the page's `next` sibling is loaded lazily when the
    /// upper bound has to be checked.
    async fn step(
        &self,
        locks: &LockScope<'_>,
        page: &mut IndexPage<K>,
        successor: Option<IndexPage<K>>,
        key: &K,
        for_insert: bool,
        intent: LockIntent,
    ) -> Result<Step<K>> {
        if page.is_empty() {
            if let Some(next) = page.next() {
                return Ok(Step::MoveRight(self.load(locks, next, intent).await?));
            }
            if page.is_leaf() {
                return Ok(Step::Land(Landing::Empty));
            }
            return Err(Error::structural(format!(
                "intermediate {} has no entries",
                page.page_id()
            )));
        }

        if page.compare_entry(0, key).is_gt() {
            if page.is_leaf() {
                return Ok(Step::Land(Landing::BeforeFirst));
            }
            if for_insert {
                // lower the separator so the new key stays inside this subtree
                page.set_entry_key(0, key.clone());
                self.save(page).await?;
                tracing::trace!(
                    target: "blinkdex::search",
                    page = %page.page_id(),
                    "separator lowered to inserted key"
                );
            }
            return self.descend(page, 0);
        }

        // largest ordinal with entry.key <= key
        let ordinal = page.entries().partition_point(|e| e.key() <= key) - 1;
        if ordinal + 1 < page.len() {
            return self.descend_or_land(page, ordinal);
        }

        let successor = match successor {
            Some(right) => Some(right),
            None => match page.next() {
                Some(next) => Some(self.load(locks, next, intent).await?),
                None => None,
            },
        };
        if let Some(right) = successor {
            if right.compare_entry(0, key).is_le() {
                if page.next() != Some(right.page_id()) {
                    return Err(Error::structural(format!(
                        "{} is not the successor of {}",
                        right.page_id(),
                        page.page_id()
                    )));
                }
                return Ok(Step::MoveRight(right));
            }
        }
        self.descend_or_land(page, ordinal)
    }

    fn descend_or_land(&self, page: &IndexPage<K>, ordinal: usize) -> Result<Step<K>> {
        if page.is_leaf() {
            Ok(Step::Land(Landing::At(ordinal)))
        } else {
            self.descend(page, ordinal)
        }
    }

    fn descend(&self, page: &IndexPage<K>, ordinal: usize) -> Result<Step<K>> {
        page.try_get_child_pointer(ordinal)
            .map(Step::Descend)
            .ok_or_else(|| {
                Error::structural(format!(
                    "{} has no child at ordinal {ordinal}",
                    page.page_id()
                ))
            })
    }

    /// Crab search in insert mode, then place the entry after the straddle
    /// point and split the leaf if it now needs it.
    pub(crate) async fn insert_inner(
        &self,
        locks: &LockScope<'_>,
        index_id: IndexId,
        key: K,
        data_page: PageId,
    ) -> Result<()> {
        let info = self.require_info(index_id)?;
        let found = self.find_inner(locks, index_id, &key, true).await?;

        let ordinal = match found.landing() {
            Landing::Empty | Landing::BeforeFirst => 0,
            Landing::At(i) => {
                if found.exact(&key).is_some() {
                    return Err(Error::DuplicateKey(format!("{key:?}")));
                }
                i + 1
            }
        };

        let mut leaf = found.into_page();
        let entry = leaf.create_entry(key, data_page);
        leaf.insert_entry(ordinal, entry)?;
        self.save(&leaf).await?;
        tracing::trace!(
            target: "blinkdex::search",
            index = %index_id,
            page = %leaf.page_id(),
            ordinal,
            "entry inserted"
        );

        if leaf.should_split(info.fill_factor()) {
            self.split_inner(locks, index_id, leaf).await?;
        }
        Ok(())
    }

    /// Walk leaf entries from the first key `>= from` until one exceeds `to`.
    pub(crate) async fn enumerate_inner<F>(
        &self,
        locks: &LockScope<'_>,
        index_id: IndexId,
        from: &K,
        to: &K,
        mut on_entry: F,
    ) -> Result<usize>
    where
        F: FnMut(&IndexPage<K>, &IndexEntry<K>, usize) -> bool + Send,
    {
        let start = self.find_inner(locks, index_id, from, false).await?;
        let mut ordinal = match start.landing() {
            Landing::Empty => return Ok(0),
            Landing::BeforeFirst => 0,
            Landing::At(i) => i,
        };
        let mut page = start.into_page();
        let mut visited = 0usize;

        loop {
            while let Some(entry) = page.entries().get(ordinal) {
                if entry.key() > to {
                    return Ok(visited);
                }
                if entry.key() >= from {
                    let keep_going = on_entry(&page, entry, visited);
                    visited += 1;
                    if !keep_going {
                        return Ok(visited);
                    }
                }
                ordinal += 1;
            }
            match page.next() {
                Some(next) => {
                    page = self.load(locks, next, LockIntent::Shared).await?;
                    ordinal = 0;
                }
                None => return Ok(visited),
            }
        }
    }
}
