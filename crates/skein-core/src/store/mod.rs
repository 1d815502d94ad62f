pub mod db;
pub mod events;
pub mod item_store;
pub mod memory;

pub use db::Database;
pub use events::{ingest_events, parse_events_jsonl, thread_refs, ThreadRefs};
pub use item_store::{normalized_conversation_id, with_retry, ConversationRepair, ItemStore, StoreError};
pub use memory::MemoryItemStore;
