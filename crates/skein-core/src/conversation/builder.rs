use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::cache::ConversationCache;
use super::ordering;
use crate::config::ConversationSettings;
use crate::constants::INVALID_ID;
use crate::models::{Item, ItemId};
use crate::remote::{NoopFetcher, RemoteFetcher};
use crate::store::{with_retry, ConversationRepair, ItemStore};

/// Outcome of one conversation build
#[derive(Debug, Clone, Default)]
pub struct ConversationBuild {
    /// Every item reached, with tree annotations set. Not in display order;
    /// see [`ordering::sort_for_display`].
    pub items: Vec<Item>,
    /// Ids that were referenced but had no local row
    pub missing: BTreeSet<ItemId>,
    /// Conversation ids were found to disagree and repair was requested
    pub repaired: bool,
}

/// Reconstructs the thread around a selected item from an [`ItemStore`].
pub struct ConversationTreeBuilder {
    store: Arc<dyn ItemStore>,
    repair: Option<Arc<dyn ConversationRepair>>,
    fetcher: Arc<dyn RemoteFetcher>,
    settings: ConversationSettings,
}

/// Fetch requests already sent during one build, shared by the repair retry
#[derive(Default)]
struct FetchLog {
    conversation_requested: bool,
    items: HashSet<ItemId>,
}

struct Visit {
    item: Item,
    reply_level: i32,
    /// Follow the parent link (selected item and its ancestors only)
    climb: bool,
}

impl ConversationTreeBuilder {
    pub fn new(store: Arc<dyn ItemStore>, settings: ConversationSettings) -> Self {
        Self {
            store,
            repair: None,
            fetcher: Arc::new(NoopFetcher),
            settings,
        }
    }

    pub fn with_repair(mut self, repair: Arc<dyn ConversationRepair>) -> Self {
        self.repair = Some(repair);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn RemoteFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn settings(&self) -> &ConversationSettings {
        &self.settings
    }

    /// Build the conversation containing `selected_id`.
    ///
    /// Missing items are requested from the fetcher when `allow_remote_fetch`
    /// is set; `force_resync` asks for the whole conversation up front.
    pub fn build(&self, selected_id: ItemId, allow_remote_fetch: bool, force_resync: bool) -> Vec<Item> {
        self.build_with_cache(&ConversationCache::new(), selected_id, allow_remote_fetch, force_resync)
            .items
    }

    /// Like [`build`](Self::build), filling `cache` so another thread holding
    /// a clone of it can watch the traversal.
    pub fn build_with_cache(
        &self,
        cache: &ConversationCache,
        selected_id: ItemId,
        allow_remote_fetch: bool,
        force_resync: bool,
    ) -> ConversationBuild {
        let mut fetches = FetchLog::default();
        let mut pass = BuildPass::new(self, cache, &mut fetches, allow_remote_fetch, force_resync);
        pass.run(selected_id);
        let mut build = pass.finish();

        if build.repaired {
            match &self.repair {
                Some(repair) => {
                    let ids: Vec<ItemId> = build.items.iter().map(Item::id).collect();
                    match repair.normalize_conversation(&ids) {
                        Ok(()) => {
                            info!(selected_id, items = ids.len(), "conversation ids normalized, rebuilding");
                            let mut retry = BuildPass::new(self, cache, &mut fetches, allow_remote_fetch, false);
                            retry.run(selected_id);
                            let retried = retry.finish();
                            if retried.repaired {
                                warn!(selected_id, "conversation ids still inconsistent after repair");
                            }
                            build = ConversationBuild {
                                repaired: true,
                                ..retried
                            };
                        }
                        Err(err) => {
                            warn!(selected_id, error = %err, "conversation repair failed");
                        }
                    }
                }
                None => {
                    warn!(selected_id, "conversation ids inconsistent, no repair available");
                }
            }
        }

        ordering::assign_order(&mut build.items);
        debug!(
            selected_id,
            items = build.items.len(),
            missing = build.missing.len(),
            "conversation built"
        );
        build
    }
}

/// State of a single traversal. Nothing here outlives one build.
struct BuildPass<'b> {
    builder: &'b ConversationTreeBuilder,
    cache: &'b ConversationCache,
    fetches: &'b mut FetchLog,
    allow_remote_fetch: bool,
    force_resync: bool,
    conversation_id: ItemId,
    items: Vec<Item>,
    visited: HashSet<ItemId>,
    missing: BTreeSet<ItemId>,
    fix_conversation: bool,
}

impl<'b> BuildPass<'b> {
    fn new(
        builder: &'b ConversationTreeBuilder,
        cache: &'b ConversationCache,
        fetches: &'b mut FetchLog,
        allow_remote_fetch: bool,
        force_resync: bool,
    ) -> Self {
        Self {
            builder,
            cache,
            fetches,
            allow_remote_fetch,
            force_resync,
            conversation_id: INVALID_ID,
            items: Vec::new(),
            visited: HashSet::new(),
            missing: BTreeSet::new(),
            fix_conversation: false,
        }
    }

    fn run(&mut self, selected_id: ItemId) {
        self.cache.clear();

        let Some(selected) = self.load_item(selected_id) else {
            if self.force_resync {
                self.request_item_fetch(selected_id);
            }
            self.report_missing(selected_id);
            return;
        };
        self.conversation_id = selected.conversation_id();
        if self.force_resync {
            self.request_resync(selected_id);
        }
        self.cache_conversation();

        let mut stack = vec![Visit {
            item: selected,
            reply_level: 0,
            climb: true,
        }];
        while let Some(visit) = stack.pop() {
            self.visit(visit, &mut stack);
        }

        self.add_missed_from_cache();
    }

    fn visit(&mut self, visit: Visit, stack: &mut Vec<Visit>) {
        let Visit {
            mut item,
            reply_level,
            climb,
        } = visit;
        let id = item.id();
        if !self.visited.insert(id) {
            return;
        }

        if item.conversation_id() != self.conversation_id {
            debug!(
                id,
                conversation_id = item.conversation_id(),
                expected = self.conversation_id,
                "conversation id conflict"
            );
            self.fix_conversation = true;
        }

        let replies = self.cache.replies_to(id);
        item.tree.reply_level = reply_level;
        item.tree.reply_count = replies.len() as u32;
        let parent_id = item.parent_id();
        self.items.push(item);

        for reply in replies.into_iter().rev() {
            if !self.visited.contains(&reply.id()) {
                stack.push(Visit {
                    item: reply,
                    reply_level: reply_level + 1,
                    climb: false,
                });
            }
        }

        if !climb || parent_id == INVALID_ID {
            return;
        }
        if self.visited.contains(&parent_id) {
            warn!(id, parent_id, "reply chain loops back, stopping at repeated id");
            return;
        }
        match self.load_item(parent_id) {
            Some(parent) => stack.push(Visit {
                item: parent,
                reply_level: reply_level - 1,
                climb: true,
            }),
            None => self.report_missing(parent_id),
        }
    }

    /// Items of the conversation that are not connected to the selected one
    fn add_missed_from_cache(&mut self) {
        for mut item in self.cache.missing_from(&self.visited) {
            item.tree.reply_level = 0;
            item.tree.reply_count = self.cache.replies_to(item.id()).len() as u32;
            self.visited.insert(item.id());
            self.items.push(item);
        }
    }

    fn cache_conversation(&mut self) {
        if self.conversation_id == INVALID_ID {
            return;
        }
        let settings = &self.builder.settings;
        let conversation_id = self.conversation_id;
        let rows = with_retry(
            "get_by_conversation_id",
            settings.store_retry_attempts,
            settings.retry_pause(),
            || self.builder.store.get_by_conversation_id(conversation_id),
        );
        match rows {
            Ok(rows) => {
                for row in rows.into_iter().filter(|row| row.is_valid()) {
                    self.cache.insert(Item::from_row(row));
                }
            }
            Err(err) => {
                warn!(conversation_id, error = %err, "conversation query failed, continuing with partial data");
            }
        }
    }

    /// Cached item, or a store lookup that is cached on success.
    /// Store failures count as a gap without a fetch request.
    fn load_item(&mut self, id: ItemId) -> Option<Item> {
        if let Some(item) = self.cache.get(id) {
            return Some(item);
        }
        let settings = &self.builder.settings;
        let row = with_retry("get_by_id", settings.store_retry_attempts, settings.retry_pause(), || {
            self.builder.store.get_by_id(id)
        });
        match row {
            Ok(Some(row)) if row.is_valid() => {
                let item = Item::from_row(row);
                self.cache.insert(item.clone());
                Some(item)
            }
            Ok(_) => {
                self.missing.insert(id);
                None
            }
            Err(err) => {
                warn!(id, error = %err, "item query failed, treating as gap");
                None
            }
        }
    }

    fn report_missing(&mut self, id: ItemId) {
        if !self.missing.contains(&id) || !self.allow_remote_fetch {
            return;
        }
        if self.conversation_id != INVALID_ID && self.builder.fetcher.supports_conversation_fetch() {
            self.request_conversation_fetch();
        } else {
            self.request_item_fetch(id);
        }
    }

    fn request_resync(&mut self, selected_id: ItemId) {
        if self.conversation_id != INVALID_ID && self.builder.fetcher.supports_conversation_fetch() {
            self.request_conversation_fetch();
        } else {
            self.request_item_fetch(selected_id);
        }
    }

    fn request_conversation_fetch(&mut self) {
        if !self.fetches.conversation_requested {
            self.fetches.conversation_requested = true;
            debug!(conversation_id = self.conversation_id, "requesting conversation fetch");
            self.builder.fetcher.request_conversation_fetch(self.conversation_id);
        }
    }

    fn request_item_fetch(&mut self, id: ItemId) {
        if self.fetches.items.insert(id) {
            debug!(id, "requesting item fetch");
            self.builder.fetcher.request_fetch(id);
        }
    }

    fn finish(self) -> ConversationBuild {
        ConversationBuild {
            items: self.items,
            missing: self.missing,
            repaired: self.fix_conversation,
        }
    }
}
