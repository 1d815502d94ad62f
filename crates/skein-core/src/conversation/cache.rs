use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::models::{Item, ItemId};

/// id -> Item cache for one conversation build.
///
/// Cloning shares the map, so a fetch requester can read it from another
/// thread while the traversal writes.
#[derive(Clone, Default)]
pub struct ConversationCache {
    items: Arc<RwLock<HashMap<ItemId, Item>>>,
}

impl ConversationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }

    pub fn insert(&self, item: Item) {
        self.items.write().insert(item.id(), item);
    }

    pub fn get(&self, id: ItemId) -> Option<Item> {
        self.items.read().get(&id).cloned()
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.items.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    /// Cached items replying to `parent_id`, by ascending id. An item never
    /// counts as a reply to itself.
    pub fn replies_to(&self, parent_id: ItemId) -> Vec<Item> {
        let mut replies: Vec<Item> = self
            .items
            .read()
            .values()
            .filter(|item| item.parent_id() == parent_id && item.id() != parent_id)
            .cloned()
            .collect();
        replies.sort_by_key(Item::id);
        replies
    }

    /// Cached items whose id is not in `seen`, by ascending id
    pub fn missing_from(&self, seen: &HashSet<ItemId>) -> Vec<Item> {
        let mut missed: Vec<Item> = self
            .items
            .read()
            .values()
            .filter(|item| !seen.contains(&item.id()))
            .cloned()
            .collect();
        missed.sort_by_key(Item::id);
        missed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemRow;

    fn item(id: ItemId, parent: ItemId) -> Item {
        Item::from_row(ItemRow::new(id, id * 10).with_parent(parent))
    }

    #[test]
    fn test_replies_skip_self_reference() {
        let cache = ConversationCache::new();
        cache.insert(item(1, 0));
        cache.insert(item(3, 1));
        cache.insert(item(2, 1));
        cache.insert(item(4, 4));

        let ids: Vec<ItemId> = cache.replies_to(1).iter().map(Item::id).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(cache.replies_to(4).is_empty());
    }

    #[test]
    fn test_missing_from() {
        let cache = ConversationCache::new();
        for id in 1..=4 {
            cache.insert(item(id, 0));
        }
        let seen: HashSet<ItemId> = [1, 3].into_iter().collect();
        let ids: Vec<ItemId> = cache.missing_from(&seen).iter().map(Item::id).collect();
        assert_eq!(ids, vec![2, 4]);
    }

    #[test]
    fn test_clones_share_entries_across_threads() {
        let cache = ConversationCache::new();
        let reader = cache.clone();
        cache.insert(item(1, 0));

        let handle = std::thread::spawn(move || reader.contains(1));
        assert!(handle.join().unwrap());

        cache.clear();
        assert!(cache.is_empty());
    }
}
