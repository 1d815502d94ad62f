use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use skein_core::config::{ConversationSettings, TimelineSettings};
use skein_core::constants::MAX_INDENT_LEVEL;
use skein_core::store::MemoryItemStore;
use skein_core::timeline::{
    CollapseState, ContentDuplication, DuplicateCollapser, DuplicationPolicy, DuplicationRelation, PageLoader,
    RelationContext,
};
use skein_core::{ConversationTreeBuilder, Item, ItemId, ItemRow, TimelineDataset, TimelineKey, WhichPage};

fn arb_direction() -> impl Strategy<Value = WhichPage> {
    prop_oneof![
        Just(WhichPage::Youngest),
        Just(WhichPage::Younger),
        Just(WhichPage::Current),
        Just(WhichPage::Older),
        Just(WhichPage::Top),
        Just(WhichPage::Any),
        Just(WhichPage::Empty),
    ]
}

/// Rows 1..=n with arbitrary parents (cycles and self references included),
/// all in conversation 1
fn arb_conversation() -> impl Strategy<Value = Vec<ItemRow>> {
    (1usize..40).prop_flat_map(|n| {
        prop::collection::vec((0..=n as i64, 1i64..500), n).prop_map(|links| {
            links
                .into_iter()
                .enumerate()
                .map(|(index, (parent, date))| {
                    ItemRow::new(index as i64 + 1, date)
                        .with_parent(parent)
                        .with_conversation(1)
                })
                .collect()
        })
    })
}

/// Timeline rows with a small body alphabet so duplicates are common
fn arb_timeline_rows() -> impl Strategy<Value = Vec<ItemRow>> {
    prop::collection::vec((1i64..300, prop::sample::select(vec!["a", "b", "c", "d"])), 0..40).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(index, (date, body))| ItemRow::new(index as i64 + 1, date).with_body(body))
            .collect()
    })
}

/// Rows with only a handful of distinct dates
fn arb_tied_rows() -> impl Strategy<Value = Vec<ItemRow>> {
    prop::collection::vec(1i64..4, 0..40).prop_map(|dates| {
        dates
            .into_iter()
            .enumerate()
            .map(|(index, date)| ItemRow::new(index as i64 + 1, date))
            .collect()
    })
}

const RELATION_SLOTS: usize = 64;

/// Relation table for `table_policy`: 0 none, 1 duplicates, 2 is duplicated
fn arb_relation_table() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..3, RELATION_SLOTS)
}

/// A pure policy answering from a fixed table keyed by the id pair, so every
/// relation (including an item taking over a group) shows up
fn table_policy(table: Vec<u8>) -> Arc<dyn DuplicationPolicy> {
    Arc::new(move |item: &Item, representative: &Item, _: &RelationContext<'_>| {
        if item.id() == representative.id() {
            return DuplicationRelation::None;
        }
        let slot = (item.id() * 7 + representative.id()).rem_euclid(RELATION_SLOTS as i64) as usize;
        match table[slot] {
            0 => DuplicationRelation::None,
            1 => DuplicationRelation::Duplicates,
            _ => DuplicationRelation::IsDuplicated,
        }
    })
}

fn loader(store: Arc<MemoryItemStore>) -> PageLoader {
    let settings = TimelineSettings {
        store_retry_pause_ms: 0,
        ..TimelineSettings::default()
    };
    PageLoader::new(store, settings)
}

fn sequence(dataset: &TimelineDataset) -> Vec<ItemId> {
    dataset.items().map(|item| item.id()).collect()
}

/// Two pages: the youngest `limit` rows, then the next older ones
fn two_pages(loader: &PageLoader, collapser: &DuplicateCollapser, state: &CollapseState, limit: usize) -> TimelineDataset {
    let mut dataset = TimelineDataset::new(TimelineKey::Everything, 5);
    for which in [WhichPage::Youngest, WhichPage::Older] {
        let params = dataset.next_page_params(which, limit);
        dataset = loader.load_dataset(&dataset, params, collapser, state);
    }
    dataset
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn conversation_ids_unique_and_ranks_dense(rows in arb_conversation(), pick in any::<prop::sample::Index>()) {
        let selected = rows[pick.index(rows.len())].id;
        let store = Arc::new(MemoryItemStore::with_rows(rows.clone()));
        let builder = ConversationTreeBuilder::new(store, ConversationSettings::default());
        let items = builder.build(selected, false, false);

        let ids: HashSet<ItemId> = items.iter().map(|item| item.id()).collect();
        prop_assert_eq!(ids.len(), items.len());
        prop_assert_eq!(items.len(), rows.len());

        let n = items.len() as i64;
        let mut list_orders: Vec<i64> = items.iter().map(|item| item.tree.list_order).collect();
        list_orders.sort_unstable();
        prop_assert_eq!(list_orders, (-n..=-1).collect::<Vec<_>>());

        let mut history_orders: Vec<u32> = items.iter().map(|item| item.tree.history_order).collect();
        history_orders.sort_unstable();
        prop_assert_eq!(history_orders, (1..=n as u32).collect::<Vec<_>>());

        for item in &items {
            prop_assert!(item.tree.indent_level <= MAX_INDENT_LEVEL);
        }
    }

    #[test]
    fn item_in_at_most_one_page(
        rows in arb_timeline_rows(),
        directions in prop::collection::vec(arb_direction(), 1..12),
        limit in 1usize..8,
        max_pages in 1usize..4,
    ) {
        let loader = loader(Arc::new(MemoryItemStore::with_rows(rows)));
        let mut dataset = TimelineDataset::new(TimelineKey::Everything, max_pages);
        for which in directions {
            let page = loader.load(dataset.next_page_params(which, limit));
            dataset = dataset.merge(page);

            let mut seen = HashSet::new();
            for id in sequence(&dataset) {
                prop_assert!(seen.insert(id), "id {} in two pages", id);
            }
            prop_assert!(dataset.pages().len() <= max_pages);
        }
    }

    #[test]
    fn older_page_possible_after_current(rows in arb_timeline_rows(), limit in 1usize..50) {
        let loader = loader(Arc::new(MemoryItemStore::with_rows(rows)));
        let dataset = TimelineDataset::new(TimelineKey::Everything, 5);
        let page = loader.load(dataset.next_page_params(WhichPage::Current, limit));
        let dataset = dataset.merge(page);
        prop_assert!(dataset.may_have_older_page());
    }

    #[test]
    fn collapse_then_expand_restores_sequence(rows in arb_timeline_rows(), distance in 0usize..6, limit in 1usize..25) {
        let loader = loader(Arc::new(MemoryItemStore::with_rows(rows)));
        let collapser = DuplicateCollapser::new(distance, Arc::new(ContentDuplication::new()));
        let mut state = CollapseState::new(false);
        let mut dataset = two_pages(&loader, &collapser, &state, limit);
        let original = sequence(&dataset);

        collapser.toggle_all(&mut dataset, &mut state, true);
        let hidden: usize = dataset.items().map(|item| item.collapsed_count()).sum();
        prop_assert_eq!(sequence(&dataset).len() + hidden, original.len());

        collapser.toggle_all(&mut dataset, &mut state, false);
        prop_assert_eq!(sequence(&dataset), original);
    }

    #[test]
    fn any_policy_collapse_then_expand_restores_sequence(
        rows in arb_timeline_rows(),
        table in arb_relation_table(),
        distance in 1usize..6,
        limit in 1usize..25,
    ) {
        let loader = loader(Arc::new(MemoryItemStore::with_rows(rows)));
        let collapser = DuplicateCollapser::new(distance, table_policy(table));
        let mut state = CollapseState::new(false);
        let mut dataset = two_pages(&loader, &collapser, &state, limit);
        let original = sequence(&dataset);

        collapser.toggle_all(&mut dataset, &mut state, true);
        let hidden: usize = dataset.items().map(|item| item.collapsed_count()).sum();
        prop_assert_eq!(sequence(&dataset).len() + hidden, original.len());

        collapser.toggle_all(&mut dataset, &mut state, false);
        prop_assert_eq!(sequence(&dataset), original);
    }

    #[test]
    fn older_pages_reach_every_row_despite_tied_dates(rows in arb_tied_rows(), limit in 1usize..6) {
        let expected: HashSet<ItemId> = rows.iter().map(|row| row.id).collect();
        let loader = loader(Arc::new(MemoryItemStore::with_rows(rows.clone())));
        let mut dataset = TimelineDataset::new(TimelineKey::Everything, rows.len() + 2);
        let page = loader.load(dataset.next_page_params(WhichPage::Youngest, limit));
        dataset = dataset.merge(page);
        for _ in 0..rows.len() {
            let page = loader.load(dataset.next_page_params(WhichPage::Older, limit));
            dataset = dataset.merge(page);
        }

        let loaded = sequence(&dataset);
        let unique: HashSet<ItemId> = loaded.iter().copied().collect();
        prop_assert_eq!(unique.len(), loaded.len());
        prop_assert_eq!(unique, expected);
    }

    #[test]
    fn zero_distance_never_collapses(rows in arb_timeline_rows(), limit in 1usize..25) {
        let loader = loader(Arc::new(MemoryItemStore::with_rows(rows)));
        let collapser = DuplicateCollapser::new(0, Arc::new(ContentDuplication::new()));
        let mut state = CollapseState::new(false);
        let mut dataset = two_pages(&loader, &collapser, &state, limit);
        let original = sequence(&dataset);

        collapser.toggle_all(&mut dataset, &mut state, true);
        prop_assert_eq!(sequence(&dataset), original.clone());
        collapser.toggle_all(&mut dataset, &mut state, false);
        prop_assert_eq!(sequence(&dataset), original);
    }
}
