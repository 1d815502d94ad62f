pub mod item;
pub mod page;
pub mod timeline_key;
pub mod view_state;

pub use item::{compare_by_date_desc, CollapsedChild, Item, ItemId, ItemRow, TreeAnnotation};
pub use page::{Page, PageId, PageParams, WhichPage};
pub use timeline_key::TimelineKey;
pub use view_state::{ViewState, ViewStateError, ViewStateStorage};
