use std::collections::HashSet;

use tracing::debug;

use crate::constants::MAX_PAGES;
use crate::models::{Item, ItemId, Page, PageParams, TimelineKey, WhichPage};

/// The bounded window of loaded pages of one timeline.
///
/// `pages[0]` is the youngest page; display order runs through the pages in
/// order and through each page's items in order. An item id occurs in at
/// most one page.
#[derive(Debug, Clone)]
pub struct TimelineDataset {
    timeline: TimelineKey,
    max_pages: usize,
    pub(crate) pages: Vec<Page>,
}

impl TimelineDataset {
    pub fn new(timeline: TimelineKey, max_pages: usize) -> Self {
        Self {
            timeline,
            max_pages: max_pages.max(1),
            pages: Vec::new(),
        }
    }

    pub fn timeline(&self) -> &TimelineKey {
        &self.timeline
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Number of visible items (collapsed duplicates excluded)
    pub fn len(&self) -> usize {
        self.pages.iter().map(Page::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(Page::is_empty)
    }

    /// Visible items in display order
    pub fn items(&self) -> impl Iterator<Item = &Item> + '_ {
        self.pages.iter().flat_map(|page| page.items().iter())
    }

    pub fn item(&self, position: usize) -> Option<&Item> {
        let (page, index) = self.locate_position(position)?;
        self.pages[page].items.get(index)
    }

    pub fn position_of(&self, id: ItemId) -> Option<usize> {
        self.items().position(|item| item.id() == id)
    }

    /// Find an item by id, including collapsed duplicates
    pub fn find_item(&self, id: ItemId) -> Option<&Item> {
        self.items().find_map(|item| {
            if item.id() == id {
                Some(item)
            } else {
                item.collapsed_children().find(|child| child.id() == id)
            }
        })
    }

    /// The visible item hiding `id` among its collapsed duplicates
    pub fn find_representative_of(&self, id: ItemId) -> Option<&Item> {
        self.items().find(|item| item.has_collapsed_child(id))
    }

    fn locate_position(&self, mut position: usize) -> Option<(usize, usize)> {
        for (page_index, page) in self.pages.iter().enumerate() {
            if position < page.len() {
                return Some((page_index, position));
            }
            position -= page.len();
        }
        None
    }

    pub(crate) fn locate_id(&self, id: ItemId) -> Option<(usize, usize)> {
        self.pages.iter().enumerate().find_map(|(page_index, page)| {
            page.items
                .iter()
                .position(|item| item.id() == id)
                .map(|index| (page_index, index))
        })
    }

    /// True when more items may exist above the youngest loaded page
    pub fn may_have_younger_page(&self) -> bool {
        match self.pages.first() {
            None => true,
            Some(page) => {
                !page.params.has_max_date()
                    || (page.rows_loaded() > 0 && page.min_date_loaded() < page.max_date_loaded())
            }
        }
    }

    /// True when more items may exist below the oldest loaded page
    pub fn may_have_older_page(&self) -> bool {
        match self.pages.last() {
            None => true,
            Some(page) => {
                page.params.which == WhichPage::Current
                    || !page.params.has_min_date()
                    || (page.rows_loaded() > 0 && page.min_date_loaded() < page.max_date_loaded())
            }
        }
    }

    /// Parameters of the next load in direction `which`, continuing after
    /// the youngest (or oldest) row loaded so far by `(date, id)`. Falls back
    /// to a youngest-page load when there is nothing to continue from.
    pub fn next_page_params(&self, which: WhichPage, limit: usize) -> PageParams {
        let fresh = |which| PageParams::new(self.timeline.clone(), which).with_limit(limit);
        match which {
            WhichPage::Younger => match self.pages.iter().find_map(Page::youngest_loaded) {
                Some((date, id)) => fresh(WhichPage::Younger).with_min_date(date).with_cursor_id(id),
                None => fresh(WhichPage::Youngest),
            },
            WhichPage::Older => match self.pages.iter().rev().find_map(Page::oldest_loaded) {
                Some((date, id)) => fresh(WhichPage::Older).with_max_date(date).with_cursor_id(id),
                None => fresh(WhichPage::Youngest),
            },
            other => fresh(other),
        }
    }

    /// Put every collapsed duplicate back into its page
    pub(crate) fn expand_all(&mut self) {
        let representatives: Vec<ItemId> = self
            .items()
            .filter(|item| item.is_collapsed())
            .map(Item::id)
            .collect();
        for id in representatives {
            self.expand_representative(id);
        }
    }

    /// Put the collapsed duplicates of representative `id` back into their
    /// pages at their load positions. Returns false if `id` hides nothing.
    pub(crate) fn expand_representative(&mut self, id: ItemId) -> bool {
        let Some((page_index, index)) = self.locate_id(id) else {
            return false;
        };
        let children = self.pages[page_index].items[index].take_collapsed_children();
        if children.is_empty() {
            return false;
        }
        let mut homeless = Vec::new();
        for child in children {
            match self.pages.iter().position(|page| page.id() == child.page_id) {
                Some(home) => self.pages[home].insert_by_ordinal(child.item),
                None => homeless.push(child.item),
            }
        }
        // Page gone: show them right after the representative, newest first
        if !homeless.is_empty() {
            let (page_index, index) = self.locate_id(id).unwrap_or((page_index, index));
            for (offset, item) in homeless.into_iter().enumerate() {
                self.pages[page_index].items.insert(index + 1 + offset, item);
            }
        }
        true
    }

    /// Merge `page` into a copy of this dataset.
    ///
    /// A page of another timeline starts a fresh dataset. Collapsed
    /// duplicates of the current dataset are expanded in the copy, so the
    /// result is always in expanded form.
    pub fn merge(&self, mut page: Page) -> TimelineDataset {
        let mut merged = if page.params.timeline == self.timeline {
            let mut seeded = self.clone();
            seeded.expand_all();
            seeded
        } else {
            TimelineDataset::new(page.params.timeline.clone(), self.max_pages)
        };
        let which = page.params.which;

        match which {
            WhichPage::Youngest => {
                if merged.pages.is_empty() {
                    merged.pages.push(page);
                } else if !merged.may_have_younger_page() {
                    merged.pages.clear();
                    merged.pages.push(page);
                } else {
                    merged.pages.remove(0);
                    merged.prune_duplicates_of(&mut page, None);
                    merged.pages.insert(0, page);
                }
            }
            WhichPage::Older => {
                merged.prune_duplicates_of(&mut page, None);
                merged.pages.push(page);
            }
            WhichPage::Younger => {
                merged.prune_duplicates_of(&mut page, None);
                merged.pages.insert(0, page);
            }
            WhichPage::Current | WhichPage::Top => {
                merged.pages.clear();
                merged.pages.push(page);
            }
            WhichPage::Any | WhichPage::Empty => {
                let same_range = merged
                    .pages
                    .iter()
                    .position(|existing| existing.params.same_range(&page.params));
                match same_range {
                    Some(index) => {
                        merged.prune_duplicates_of(&mut page, Some(index));
                        merged.pages[index] = page;
                    }
                    None => {
                        merged.prune_duplicates_of(&mut page, None);
                        merged.pages.push(page);
                    }
                }
            }
        }

        while merged.pages.len() > merged.max_pages {
            let evicted = if which.grows_younger_end() {
                merged.pages.pop()
            } else {
                Some(merged.pages.remove(0))
            };
            if let Some(evicted) = evicted {
                debug!(items = evicted.len(), ?which, "evicted page from timeline window");
            }
        }
        merged
    }

    /// Drop from `page` every item already present in the kept pages
    /// (all pages except `replacing`).
    fn prune_duplicates_of(&self, page: &mut Page, replacing: Option<usize>) {
        let present: HashSet<ItemId> = self
            .pages
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != replacing)
            .flat_map(|(_, existing)| existing.ids())
            .collect();
        let removed = page.remove_ids(&present);
        if removed > 0 {
            debug!(removed, which = ?page.params.which, "pruned duplicate items from new page");
        }
    }
}
