pub mod config;
pub mod constants;
pub mod conversation;
pub mod events;
pub mod models;
pub mod remote;
pub mod runtime;
pub mod store;
pub mod timeline;
pub mod tracing_setup;

// Re-export the types most callers need at crate root
pub use config::CoreConfig;
pub use conversation::ConversationTreeBuilder;
pub use models::{Item, ItemId, ItemRow, Page, PageParams, TimelineKey, WhichPage};
pub use timeline::{DuplicateCollapser, TimelineDataset, TimelineView};
