pub mod dataset;
pub mod duplicates;
pub mod loader;
pub mod relation;
pub mod view;

pub use dataset::TimelineDataset;
pub use duplicates::{CollapseState, DuplicateCollapser};
pub use loader::PageLoader;
pub use relation::{ContentDuplication, DuplicationPolicy, DuplicationRelation, RelationContext};
pub use view::TimelineView;
