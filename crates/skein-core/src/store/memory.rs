use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use super::item_store::{normalized_conversation_id, ConversationRepair, ItemStore, StoreError};
use crate::models::{ItemId, ItemRow, PageParams};

/// In-memory item store. Used by tests and by embedders that already hold
/// their rows elsewhere.
#[derive(Default)]
pub struct MemoryItemStore {
    rows: RwLock<BTreeMap<ItemId, ItemRow>>,
    failures_left: AtomicU32,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows<I: IntoIterator<Item = ItemRow>>(rows: I) -> Self {
        let store = Self::new();
        store.insert_all(rows);
        store
    }

    pub fn insert(&self, row: ItemRow) {
        self.rows.write().insert(row.id, row);
    }

    pub fn insert_all<I: IntoIterator<Item = ItemRow>>(&self, rows: I) {
        let mut guard = self.rows.write();
        for row in rows {
            guard.insert(row.id, row);
        }
    }

    pub fn remove(&self, id: ItemId) -> Option<ItemRow> {
        self.rows.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Make the next `count` queries fail with `StoreError::Unavailable`
    pub fn fail_next(&self, count: u32) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), StoreError> {
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        match injected {
            Ok(_) => Err(StoreError::Unavailable("injected failure".to_string())),
            Err(_) => Ok(()),
        }
    }
}

impl ItemStore for MemoryItemStore {
    fn get_by_id(&self, id: ItemId) -> Result<Option<ItemRow>, StoreError> {
        self.check_failure()?;
        Ok(self.rows.read().get(&id).filter(|row| row.is_valid()).cloned())
    }

    fn get_by_conversation_id(&self, conversation_id: ItemId) -> Result<Vec<ItemRow>, StoreError> {
        self.check_failure()?;
        Ok(self
            .rows
            .read()
            .values()
            .filter(|row| row.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    fn query_page(&self, params: &PageParams) -> Result<Vec<ItemRow>, StoreError> {
        self.check_failure()?;
        let rows = self.rows.read();
        Ok(params.select_rows(rows.values()))
    }
}

impl ConversationRepair for MemoryItemStore {
    fn normalize_conversation(&self, ids: &[ItemId]) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        let target = normalized_conversation_id(ids.iter().filter_map(|id| rows.get(id)));
        for id in ids {
            if let Some(row) = rows.get_mut(id) {
                row.conversation_id = target;
            }
        }
        Ok(())
    }
}
