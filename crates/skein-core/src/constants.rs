//! Engine-wide constants
//!
//! Centralized location for limits and defaults shared by the conversation
//! builder, the paged timeline and the duplicate collapser.

/// Deepest indent a conversation item can be rendered at.
pub const MAX_INDENT_LEVEL: u32 = 19;

/// Maximum number of pages kept in one timeline dataset.
pub const MAX_PAGES: usize = 5;

/// Default number of rows requested per timeline page.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Default maximum distance (in display positions) between duplicates
/// that still get grouped together. Values below 1 disable collapsing.
pub const DEFAULT_MAX_DISTANCE_BETWEEN_DUPLICATES: usize = 5;

/// How many times a failing store query is attempted before giving up.
pub const DEFAULT_STORE_RETRY_ATTEMPTS: u32 = 3;

/// Pause between store query attempts, in milliseconds.
pub const DEFAULT_STORE_RETRY_PAUSE_MS: u64 = 500;

/// Id value meaning "no item" (placeholder rows, root items' parent).
pub const INVALID_ID: i64 = 0;

/// Date value meaning "bound not set" in page parameters.
pub const UNSET_DATE: i64 = 0;

/// File names inside the data directory
pub mod files {
    /// SQLite item store
    pub const ITEM_DB: &str = "items.db";
    /// Persisted per-timeline view state
    pub const VIEW_STATE: &str = "view_state.json";
    /// Optional engine configuration
    pub const CONFIG: &str = "config.json";
}

// Nostr event kinds understood by the ingest path
pub mod kinds {
    /// Text note (conversation root or reply)
    pub const TEXT_NOTE: u16 = 1;
}
