use std::sync::mpsc::SendError;
use std::sync::Arc;

use tracing::debug;

use super::dataset::TimelineDataset;
use super::duplicates::{CollapseState, DuplicateCollapser};
use super::loader::PageLoader;
use crate::config::TimelineSettings;
use crate::events::CoreEvent;
use crate::models::{ItemId, TimelineKey, ViewState, WhichPage};
use crate::runtime::{ListHandle, LoadCommand, LoadTicket};

/// What the rendering thread holds for one timeline: the published
/// snapshot, the collapse state it owns, and the ticket of the load it is
/// waiting for.
///
/// The snapshot is only ever replaced whole, so a reader holding the old
/// `Arc` keeps a consistent dataset while a reload runs.
pub struct TimelineView {
    collapser: Arc<DuplicateCollapser>,
    snapshot: Arc<TimelineDataset>,
    state: CollapseState,
    default_collapse: bool,
    latest: Option<LoadTicket>,
    page_size: usize,
}

impl TimelineView {
    pub fn new(timeline: TimelineKey, settings: &TimelineSettings, collapser: Arc<DuplicateCollapser>) -> Self {
        Self {
            collapser,
            snapshot: Arc::new(TimelineDataset::new(timeline, settings.max_pages)),
            state: CollapseState::new(settings.collapse_duplicates),
            default_collapse: settings.collapse_duplicates,
            latest: None,
            page_size: settings.page_size.max(1),
        }
    }

    pub fn timeline(&self) -> &TimelineKey {
        self.snapshot.timeline()
    }

    pub fn snapshot(&self) -> Arc<TimelineDataset> {
        Arc::clone(&self.snapshot)
    }

    pub fn collapse_state(&self) -> &CollapseState {
        &self.state
    }

    /// A load was requested and its result has not been published yet
    pub fn is_loading(&self) -> bool {
        self.latest.is_some()
    }

    /// Take over the collapse choices saved by an earlier session
    pub fn restore(&mut self, saved: &ViewState) {
        self.state = CollapseState {
            collapse_duplicates: saved.collapse_duplicates.unwrap_or(self.default_collapse),
            overrides: saved.collapse_overrides.clone(),
        };
        let state = &self.state;
        self.collapser.recollapse(Arc::make_mut(&mut self.snapshot), state);
    }

    /// State worth persisting, given the position of the topmost visible row
    pub fn view_state(&self, visible_position: usize, scroll_offset: i32) -> ViewState {
        let visible = self.snapshot.item(visible_position);
        ViewState {
            visible_item_id: visible.map_or(0, |item| item.id()),
            scroll_offset,
            oldest_visible_date: visible.map_or(0, |item| item.date()),
            collapse_duplicates: Some(self.state.collapse_duplicates),
            collapse_overrides: self.state.overrides.clone(),
        }
    }

    /// Queue a load in direction `which` on the list worker. Any earlier
    /// request still in flight is superseded.
    pub fn request(&mut self, handle: &ListHandle, which: WhichPage) -> Result<LoadTicket, SendError<LoadCommand>> {
        let params = self.snapshot.next_page_params(which, self.page_size);
        let ticket = handle.load_page(self.snapshot(), params, self.state.clone())?;
        debug!(timeline = %self.timeline(), ?which, ?ticket, "page load requested");
        self.latest = Some(ticket);
        Ok(ticket)
    }

    /// Load and publish on the calling thread
    pub fn load_now(&mut self, loader: &PageLoader, which: WhichPage) {
        let params = self.snapshot.next_page_params(which, self.page_size);
        let dataset = loader.load_dataset(&self.snapshot, params, &self.collapser, &self.state);
        self.snapshot = Arc::new(dataset);
        self.latest = None;
    }

    /// Show another timeline. Outstanding loads for the old one are ignored
    /// when they arrive.
    pub fn switch_timeline(&mut self, timeline: TimelineKey) {
        if &timeline == self.timeline() {
            return;
        }
        let max_pages = self.snapshot.max_pages();
        self.snapshot = Arc::new(TimelineDataset::new(timeline, max_pages));
        self.state = CollapseState::new(self.default_collapse);
        self.latest = None;
    }

    /// Replace the snapshot with a freshly built dataset, unless a newer
    /// request superseded it. `used` is the collapse state the worker built
    /// with; toggles made since then are applied before publishing.
    pub fn publish(&mut self, ticket: LoadTicket, mut dataset: TimelineDataset, used: CollapseState) -> bool {
        if self.latest != Some(ticket) {
            debug!(?ticket, latest = ?self.latest, "dropping superseded page load");
            return false;
        }
        if dataset.timeline() != self.timeline() {
            debug!(?ticket, "dropping page load for another timeline");
            return false;
        }
        if used != self.state {
            self.collapser.recollapse(&mut dataset, &self.state);
        }
        self.snapshot = Arc::new(dataset);
        self.latest = None;
        true
    }

    /// Apply a worker event. Returns true when the snapshot changed.
    pub fn handle_event(&mut self, event: CoreEvent) -> bool {
        match event {
            CoreEvent::TimelineLoaded {
                ticket,
                dataset,
                collapse,
            } => self.publish(ticket, dataset, collapse),
            CoreEvent::ConversationLoaded { .. } => false,
        }
    }

    pub fn toggle_all(&mut self, collapse: bool) {
        let state = &mut self.state;
        self.collapser.toggle_all(Arc::make_mut(&mut self.snapshot), state, collapse);
    }

    pub fn toggle_one(&mut self, id: ItemId, collapse: bool) {
        let state = &mut self.state;
        self.collapser.toggle_one(Arc::make_mut(&mut self.snapshot), state, id, collapse);
    }

    /// Show the hidden duplicates of `id`'s group without recording an override
    pub fn expand(&mut self, id: ItemId) -> bool {
        self.collapser.expand(Arc::make_mut(&mut self.snapshot), id)
    }

    pub fn can_be_collapsed(&self, position: usize) -> bool {
        self.collapser.can_be_collapsed(&self.snapshot, position)
    }
}
