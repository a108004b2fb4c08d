//! Index creation and bulk bottom-up rebuild.

use std::collections::VecDeque;

use crate::common::{Error, FileGroupId, IndexId, IndexSubKind, ObjectId, PageId, Result};
use crate::storage::LockIntent;

use super::entry::IndexEntry;
use super::key::IndexKey;
use super::lock_scope::LockScope;
use super::manager::IndexManager;
use super::page::IndexPage;
use super::root_info::RootIndexInfo;

impl<K: IndexKey> IndexManager<K> {
    pub(crate) async fn create_inner(
        &self,
        locks: &LockScope<'_>,
        name: &str,
        file_group: FileGroupId,
        sub_kind: IndexSubKind,
    ) -> Result<IndexId> {
        if self.registered_sub_kind(sub_kind) {
            return Err(Error::DuplicateSubKind(sub_kind));
        }
        let index_id = self.next_index_id()?;
        let object_id = self.context.object_id();

        let mut info = RootIndexInfo::new(
            index_id,
            object_id,
            file_group,
            sub_kind,
            name,
            self.config.fill_factor,
        );
        let root = self.init_page(locks, &info, 0, true).await?;
        self.save(&root).await?;
        info.set_root(root.page_id(), 0);
        self.publish(info).await?;

        tracing::info!(
            target: "blinkdex::manager",
            index = %index_id,
            %object_id,
            %sub_kind,
            name,
            root = %root.page_id(),
            "index created"
        );

        if self.store.first_data_page(object_id).await?.is_some() {
            self.rebuild_inner(locks, file_group, object_id, index_id).await?;
        }
        Ok(index_id)
    }

    /// Build a fresh tree from the data-page chain, swap it in, then free
    /// the old one.
    ///
    /// `hierarchy[level]` is the page currently being filled at that level;
    /// the last element is always the root of the tree built so far.
    pub(crate) async fn rebuild_inner(
        &self,
        locks: &LockScope<'_>,
        file_group: FileGroupId,
        object_id: ObjectId,
        index_id: IndexId,
    ) -> Result<()> {
        if object_id != self.context.object_id() {
            return Err(Error::UnknownObject(object_id));
        }
        let mut info = self.require_info(index_id)?;
        let old_root = info.root_page();
        info.set_file_group(file_group);

        let mut hierarchy = vec![self.init_page(locks, &info, 0, true).await?];
        let mut ordinal = 0u64;
        let mut cursor = self.store.first_data_page(object_id).await?;

        while let Some(data_page) = cursor {
            let entry = IndexEntry::leaf(self.context.key_for(ordinal), data_page);
            if hierarchy[0].is_full() {
                let mut leaf = self.init_page(locks, &info, 0, false).await?;
                leaf.add_link(entry)?;
                self.attach_sibling(locks, &info, &mut hierarchy, leaf).await?;
            } else {
                hierarchy[0].add_link(entry)?;
            }
            ordinal += 1;
            cursor = self.store.next_data_page(data_page).await?;
        }

        for page in &hierarchy {
            self.save(page).await?;
        }
        let root = hierarchy
            .last()
            .ok_or_else(|| Error::structural("rebuild produced no root"))?;

        info.set_root(root.page_id(), root.depth());
        self.publish(info).await?;

        tracing::info!(
            target: "blinkdex::manager",
            index = %index_id,
            entries = ordinal,
            root = %root.page_id(),
            depth = root.depth(),
            "index rebuilt"
        );

        if old_root.is_valid() && old_root != root.page_id() {
            self.free_tree(locks, old_root).await?;
        }
        Ok(())
    }

    /// Link `new_page` after the full page at its level, climbing while the
    /// parent level is full too.
    async fn attach_sibling(
        &self,
        locks: &LockScope<'_>,
        info: &RootIndexInfo,
        hierarchy: &mut Vec<IndexPage<K>>,
        new_page: IndexPage<K>,
    ) -> Result<()> {
        let mut level = 0;
        let mut new_page = new_page;
        loop {
            {
                let old = &mut hierarchy[level];
                old.set_next(Some(new_page.page_id()));
                new_page.set_prev(Some(old.page_id()));
            }

            if level + 1 == hierarchy.len() {
                // no parent: grow a root over both pages
                let mut root = self.init_page(locks, info, new_page.depth() + 1, true).await?;
                let old = &mut hierarchy[level];
                old.set_root(false);
                old.set_parent(Some(root.page_id()));
                new_page.set_parent(Some(root.page_id()));
                root.add_link(IndexPage::create_link_entry(old)?)?;
                root.add_link(IndexPage::create_link_entry(&new_page)?)?;

                self.save(old).await?;
                hierarchy[level] = new_page;
                hierarchy.push(root);
                return Ok(());
            }

            let link = IndexPage::create_link_entry(&new_page)?;
            if !hierarchy[level + 1].is_full() {
                new_page.set_parent(Some(hierarchy[level + 1].page_id()));
                hierarchy[level + 1].add_link(link)?;
                self.save(&hierarchy[level]).await?;
                hierarchy[level] = new_page;
                return Ok(());
            }

            // parent level full too: the new page gets a fresh parent that
            // is itself attached one level up
            let mut new_parent = self.init_page(locks, info, new_page.depth() + 1, false).await?;
            new_page.set_parent(Some(new_parent.page_id()));
            new_parent.add_link(link)?;
            self.save(&hierarchy[level]).await?;
            hierarchy[level] = new_page;

            new_page = new_parent;
            level += 1;
        }
    }

    /// Deallocate every page reachable from `root`.
    async fn free_tree(&self, locks: &LockScope<'_>, root: PageId) -> Result<()> {
        let mut queue = VecDeque::from([root]);
        let mut freed = 0usize;
        while let Some(page_id) = queue.pop_front() {
            let page = self.load(locks, page_id, LockIntent::Exclusive).await?;
            queue.extend(page.children());
            self.store.deallocate_page(page_id).await?;
            freed += 1;
        }
        tracing::debug!(target: "blinkdex::manager", %root, freed, "old tree released");
        Ok(())
    }
}
