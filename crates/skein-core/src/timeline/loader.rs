use std::sync::Arc;

use tracing::{debug, warn};

use super::dataset::TimelineDataset;
use super::duplicates::{CollapseState, DuplicateCollapser};
use crate::config::TimelineSettings;
use crate::models::{Page, PageParams};
use crate::store::{with_retry, ItemStore};

/// Loads one page from the item store.
pub struct PageLoader {
    store: Arc<dyn ItemStore>,
    settings: TimelineSettings,
}

impl PageLoader {
    pub fn new(store: Arc<dyn ItemStore>, settings: TimelineSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &TimelineSettings {
        &self.settings
    }

    /// Query the page described by `params`. A query that keeps failing
    /// after the configured retries yields an empty page.
    pub fn load(&self, params: PageParams) -> Page {
        let rows = with_retry(
            "query_page",
            self.settings.store_retry_attempts,
            self.settings.retry_pause(),
            || self.store.query_page(&params),
        );
        match rows {
            Ok(rows) => {
                debug!(timeline = %params.timeline, which = ?params.which, rows = rows.len(), "page loaded");
                Page::new(params, rows)
            }
            Err(err) => {
                warn!(timeline = %params.timeline, which = ?params.which, error = %err, "page load failed");
                Page::empty(params)
            }
        }
    }

    /// One full rebuild: load the page, merge it into a copy of `base` and
    /// collapse duplicates as `state` says. `base` is left untouched.
    pub fn load_dataset(
        &self,
        base: &TimelineDataset,
        params: PageParams,
        collapser: &DuplicateCollapser,
        state: &CollapseState,
    ) -> TimelineDataset {
        let page = self.load(params);
        let mut dataset = base.merge(page);
        collapser.recollapse(&mut dataset, state);
        dataset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ItemRow, TimelineKey, WhichPage};
    use crate::store::MemoryItemStore;
    use crate::timeline::relation::ContentDuplication;

    fn loader(store: &Arc<MemoryItemStore>) -> PageLoader {
        let settings = TimelineSettings {
            store_retry_attempts: 2,
            store_retry_pause_ms: 0,
            ..TimelineSettings::default()
        };
        PageLoader::new(store.clone(), settings)
    }

    #[test]
    fn test_load_page() {
        let store = Arc::new(MemoryItemStore::with_rows(vec![ItemRow::new(1, 10), ItemRow::new(2, 20)]));
        store.fail_next(1);
        let page = loader(&store).load(PageParams::new(TimelineKey::Everything, WhichPage::Youngest));
        assert_eq!(page.ids().collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(page.rows_loaded(), 2);
    }

    #[test]
    fn test_failed_load_is_empty_page() {
        let store = Arc::new(MemoryItemStore::with_rows(vec![ItemRow::new(1, 10)]));
        store.fail_next(5);
        let page = loader(&store).load(PageParams::new(TimelineKey::Everything, WhichPage::Older));
        assert!(page.is_empty());
        assert_eq!(page.rows_loaded(), 0);
        assert_eq!(page.params.which, WhichPage::Older);
    }

    #[test]
    fn test_load_dataset_leaves_base_alone() {
        let store = Arc::new(MemoryItemStore::with_rows(vec![
            ItemRow::new(1, 10).with_body("same"),
            ItemRow::new(2, 20).with_body("same"),
            ItemRow::new(3, 30).with_body("other"),
        ]));
        let loader = loader(&store);
        let collapser = DuplicateCollapser::new(2, Arc::new(ContentDuplication::new()));
        let base = TimelineDataset::new(TimelineKey::Everything, 5);

        let params = base.next_page_params(WhichPage::Youngest, 10);
        let dataset = loader.load_dataset(&base, params, &collapser, &CollapseState::new(true));
        assert_eq!(dataset.items().map(|i| i.id()).collect::<Vec<_>>(), vec![3, 2]);
        assert!(base.is_empty());
    }
}
