pub mod builder;
pub mod cache;
pub mod ordering;

pub use builder::{ConversationBuild, ConversationTreeBuilder};
pub use cache::ConversationCache;
pub use ordering::{assign_order, sort_for_display};
