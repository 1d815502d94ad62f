use std::time::Duration;

use tracing::warn;

use crate::constants::INVALID_ID;
use crate::models::{ItemId, ItemRow, PageParams};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Row access the conversation builder and the page loader read from.
///
/// Implementations are called from background workers. They may hold stale
/// parent references or inconsistent conversation ids; callers cope with both.
pub trait ItemStore: Send + Sync {
    /// `None` when the id has no loaded row (unknown or placeholder)
    fn get_by_id(&self, id: ItemId) -> Result<Option<ItemRow>, StoreError>;

    fn get_by_conversation_id(&self, conversation_id: ItemId) -> Result<Vec<ItemRow>, StoreError>;

    /// Rows covered by `params`, in display order. See [`PageParams::select_rows`].
    fn query_page(&self, params: &PageParams) -> Result<Vec<ItemRow>, StoreError>;
}

/// Rewrites conversation ids of items that were found to disagree
pub trait ConversationRepair: Send + Sync {
    fn normalize_conversation(&self, ids: &[ItemId]) -> Result<(), StoreError>;
}

/// Conversation id every row in `rows` should share: the smallest non-zero
/// conversation id among them, or the smallest item id when none has one.
pub fn normalized_conversation_id<'a, I>(rows: I) -> ItemId
where
    I: IntoIterator<Item = &'a ItemRow>,
{
    let mut smallest_conversation = None;
    let mut smallest_id = None;
    for row in rows {
        if row.conversation_id != INVALID_ID {
            smallest_conversation = Some(
                smallest_conversation.map_or(row.conversation_id, |c: ItemId| c.min(row.conversation_id)),
            );
        }
        if row.id != INVALID_ID {
            smallest_id = Some(smallest_id.map_or(row.id, |c: ItemId| c.min(row.id)));
        }
    }
    smallest_conversation.or(smallest_id).unwrap_or(INVALID_ID)
}

/// Run a store query up to `attempts` times, sleeping `pause` between tries.
/// Returns the last error once attempts are exhausted.
pub fn with_retry<T, F>(what: &str, attempts: u32, pause: Duration, mut query: F) -> Result<T, StoreError>
where
    F: FnMut() -> Result<T, StoreError>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match query() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                warn!(what, attempt, attempts, error = %err, "store query failed, retrying");
                std::thread::sleep(pause);
                attempt += 1;
            }
            Err(err) => {
                warn!(what, attempts, error = %err, "store query failed, giving up");
                return Err(err);
            }
        }
    }
}
