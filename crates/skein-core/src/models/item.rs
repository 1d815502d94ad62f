use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::page::PageId;
use crate::constants::INVALID_ID;

/// Row id of an item in the store. `0` is the invalid/placeholder id.
pub type ItemId = i64;

/// Immutable payload of one note/activity, as read from the item store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRow {
    pub id: ItemId,
    /// Logical update timestamp (unix seconds)
    pub date: i64,
    /// Id of the item this one replies to, `0` for none
    pub parent_id: ItemId,
    /// Grouping key of the thread this item belongs to, `0` if unknown
    pub conversation_id: ItemId,
    /// Account/server the item was received from
    #[serde(default)]
    pub origin_id: i64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub body: String,
}

impl ItemRow {
    pub fn new(id: ItemId, date: i64) -> Self {
        Self {
            id,
            date,
            parent_id: INVALID_ID,
            conversation_id: INVALID_ID,
            origin_id: 0,
            author: String::new(),
            body: String::new(),
        }
    }

    pub fn with_parent(mut self, parent_id: ItemId) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn with_conversation(mut self, conversation_id: ItemId) -> Self {
        self.conversation_id = conversation_id;
        self
    }

    pub fn with_origin(mut self, origin_id: i64) -> Self {
        self.origin_id = origin_id;
        self
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_valid(&self) -> bool {
        self.id != INVALID_ID
    }
}

/// Tree-derived render annotation, written only by the conversation builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeAnnotation {
    /// Signed distance from the item the traversal started at
    pub reply_level: i32,
    /// Rendering indent, never above [`crate::constants::MAX_INDENT_LEVEL`]
    pub indent_level: u32,
    /// Dense rank, descending as a list position (-1, -2, ...)
    pub list_order: i64,
    /// Dense rank, ascending, 1-based, user-visible
    pub history_order: u32,
    pub reply_count: u32,
    pub parent_reply_count: u32,
}

/// A duplicate hidden under its group representative. Remembers the page it
/// was taken out of so it can be put back exactly where it was.
#[derive(Debug, Clone, Serialize)]
pub struct CollapsedChild {
    #[serde(skip)]
    pub(crate) page_id: PageId,
    #[serde(flatten)]
    pub item: Item,
}

/// One display-ready item: store payload plus the annotations derived from it.
///
/// Identity is the row id only; two `Item`s with the same id compare equal
/// whatever their annotations.
#[derive(Debug, Clone, Serialize)]
pub struct Item {
    #[serde(flatten)]
    pub row: ItemRow,
    pub tree: TreeAnnotation,
    /// Position within the page the item was loaded into
    #[serde(skip)]
    pub(crate) ordinal: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    collapsed_children: Vec<CollapsedChild>,
}

impl Item {
    pub fn from_row(row: ItemRow) -> Self {
        Self {
            row,
            tree: TreeAnnotation::default(),
            ordinal: 0,
            collapsed_children: Vec::new(),
        }
    }

    pub fn id(&self) -> ItemId {
        self.row.id
    }

    pub fn date(&self) -> i64 {
        self.row.date
    }

    pub fn parent_id(&self) -> ItemId {
        self.row.parent_id
    }

    pub fn conversation_id(&self) -> ItemId {
        self.row.conversation_id
    }

    /// True while this item represents a collapsed group of duplicates
    pub fn is_collapsed(&self) -> bool {
        !self.collapsed_children.is_empty()
    }

    pub fn collapsed_children(&self) -> impl Iterator<Item = &Item> + '_ {
        self.collapsed_children.iter().map(|child| &child.item)
    }

    pub fn collapsed_count(&self) -> usize {
        self.collapsed_children.len()
    }

    pub fn has_collapsed_child(&self, id: ItemId) -> bool {
        self.collapsed_children.iter().any(|child| child.item.id() == id)
    }

    /// Hide `child` under this item. Children stay ordered by descending date.
    pub(crate) fn push_collapsed_child(&mut self, page_id: PageId, child: Item) {
        let pos = self
            .collapsed_children
            .iter()
            .position(|existing| compare_by_date_desc(&child, &existing.item) == Ordering::Less)
            .unwrap_or(self.collapsed_children.len());
        self.collapsed_children.insert(pos, CollapsedChild { page_id, item: child });
    }

    pub(crate) fn take_collapsed_children(&mut self) -> Vec<CollapsedChild> {
        std::mem::take(&mut self.collapsed_children)
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.row.id == other.row.id
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.row.id.hash(state);
    }
}

/// Display order of timelines: youngest first, ties broken by larger id first.
pub fn compare_by_date_desc(a: &Item, b: &Item) -> Ordering {
    b.date().cmp(&a.date()).then_with(|| b.id().cmp(&a.id()))
}
