use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::item::{Item, ItemId, ItemRow};
use super::timeline_key::TimelineKey;
use crate::constants::{DEFAULT_PAGE_SIZE, INVALID_ID, UNSET_DATE};

/// Requested direction of a page load, relative to what is already shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WhichPage {
    Youngest,
    Younger,
    Current,
    Older,
    Top,
    Any,
    Empty,
}

impl WhichPage {
    /// True for loads that grow the window at its young end
    pub fn grows_younger_end(self) -> bool {
        matches!(self, WhichPage::Youngest | WhichPage::Younger)
    }
}

/// What to load: a timeline, a direction and an inclusive date window.
/// A date bound of `0` is unset.
///
/// `cursor_id` continues a walk through rows sharing one date: an OLDER
/// load admits rows at `max_date` only below it, a YOUNGER load rows at
/// `min_date` only above it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    pub timeline: TimelineKey,
    pub which: WhichPage,
    #[serde(default)]
    pub min_date: i64,
    #[serde(default)]
    pub max_date: i64,
    #[serde(default)]
    pub cursor_id: ItemId,
    pub limit: usize,
}

impl PageParams {
    pub fn new(timeline: TimelineKey, which: WhichPage) -> Self {
        Self {
            timeline,
            which,
            min_date: UNSET_DATE,
            max_date: UNSET_DATE,
            cursor_id: INVALID_ID,
            limit: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_min_date(mut self, min_date: i64) -> Self {
        self.min_date = min_date;
        self
    }

    pub fn with_max_date(mut self, max_date: i64) -> Self {
        self.max_date = max_date;
        self
    }

    pub fn with_cursor_id(mut self, cursor_id: ItemId) -> Self {
        self.cursor_id = cursor_id;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn has_min_date(&self) -> bool {
        self.min_date != UNSET_DATE
    }

    pub fn has_max_date(&self) -> bool {
        self.max_date != UNSET_DATE
    }

    pub fn admits_date(&self, date: i64) -> bool {
        (!self.has_min_date() || date >= self.min_date)
            && (!self.has_max_date() || date <= self.max_date)
    }

    /// Date window plus the tie-break on `cursor_id` at the bound the
    /// direction continues from
    pub fn admits(&self, row: &ItemRow) -> bool {
        if !self.admits_date(row.date) {
            return false;
        }
        if self.cursor_id == INVALID_ID {
            return true;
        }
        match self.which {
            WhichPage::Older if self.has_max_date() && row.date == self.max_date => row.id < self.cursor_id,
            WhichPage::Younger if self.has_min_date() && row.date == self.min_date => row.id > self.cursor_id,
            _ => true,
        }
    }

    /// Same date window as `other`, whatever the direction
    pub fn same_range(&self, other: &PageParams) -> bool {
        self.min_date == other.min_date && self.max_date == other.max_date
    }

    /// Select the rows this page covers from `rows`, in display order
    /// (date desc, id desc).
    ///
    /// YOUNGER takes the `limit` rows closest above `min_date`; every other
    /// direction takes the `limit` youngest rows inside the window. Placeholder
    /// rows never qualify.
    pub fn select_rows<'a, I>(&self, rows: I) -> Vec<ItemRow>
    where
        I: IntoIterator<Item = &'a ItemRow>,
    {
        if self.which == WhichPage::Empty || self.limit == 0 {
            return Vec::new();
        }
        let mut selected: Vec<ItemRow> = rows
            .into_iter()
            .filter(|row| row.is_valid())
            .filter(|row| self.timeline.matches(row))
            .filter(|row| self.admits(row))
            .cloned()
            .collect();

        if self.which == WhichPage::Younger {
            selected.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
            selected.truncate(self.limit);
            selected.reverse();
        } else {
            selected.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.id.cmp(&a.id)));
            selected.truncate(self.limit);
        }
        selected
    }
}

/// Process-unique identity of one loaded page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(u64);

impl PageId {
    pub(crate) fn next() -> Self {
        static NEXT_PAGE_ID: AtomicU64 = AtomicU64::new(1);
        PageId(NEXT_PAGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One directionally loaded slice of a timeline.
///
/// The loaded counters describe what the store returned and are not
/// touched when the dataset prunes duplicates out of the page.
#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    pub params: PageParams,
    pub(crate) items: Vec<Item>,
    rows_loaded: usize,
    min_date_loaded: i64,
    max_date_loaded: i64,
    /// (date, id) of the oldest and youngest row returned
    oldest_loaded: Option<(i64, ItemId)>,
    youngest_loaded: Option<(i64, ItemId)>,
}

impl Page {
    pub fn new(params: PageParams, rows: Vec<ItemRow>) -> Self {
        let rows_loaded = rows.len();
        let min_date_loaded = rows.iter().map(|r| r.date).min().unwrap_or(UNSET_DATE);
        let max_date_loaded = rows.iter().map(|r| r.date).max().unwrap_or(UNSET_DATE);
        let oldest_loaded = rows.iter().map(|r| (r.date, r.id)).min();
        let youngest_loaded = rows.iter().map(|r| (r.date, r.id)).max();
        let items = rows
            .into_iter()
            .enumerate()
            .map(|(ordinal, row)| {
                let mut item = Item::from_row(row);
                item.ordinal = ordinal as u32;
                item
            })
            .collect();
        Self {
            id: PageId::next(),
            params,
            items,
            rows_loaded,
            min_date_loaded,
            max_date_loaded,
            oldest_loaded,
            youngest_loaded,
        }
    }

    /// Result of a failed load: no rows, `rows_loaded == 0`
    pub fn empty(params: PageParams) -> Self {
        Self::new(params, Vec::new())
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn rows_loaded(&self) -> usize {
        self.rows_loaded
    }

    pub fn min_date_loaded(&self) -> i64 {
        self.min_date_loaded
    }

    pub fn max_date_loaded(&self) -> i64 {
        self.max_date_loaded
    }

    pub fn oldest_loaded(&self) -> Option<(i64, ItemId)> {
        self.oldest_loaded
    }

    pub fn youngest_loaded(&self) -> Option<(i64, ItemId)> {
        self.youngest_loaded
    }

    pub fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.items.iter().map(Item::id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.iter().any(|item| item.id() == id)
    }

    /// Drop every item whose id is in `ids`; returns how many were dropped
    pub(crate) fn remove_ids(&mut self, ids: &HashSet<ItemId>) -> usize {
        let before = self.items.len();
        self.items.retain(|item| !ids.contains(&item.id()));
        before - self.items.len()
    }

    /// Put `item` back at its load position among the items still present
    pub(crate) fn insert_by_ordinal(&mut self, item: Item) {
        let pos = self
            .items
            .iter()
            .position(|existing| existing.ordinal > item.ordinal)
            .unwrap_or(self.items.len());
        self.items.insert(pos, item);
    }
}
