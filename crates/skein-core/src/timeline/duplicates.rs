use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::dataset::TimelineDataset;
use super::relation::{DuplicationPolicy, DuplicationRelation, RelationContext};
use crate::models::{Item, ItemId, PageId};

/// Global collapse default plus the per-item exceptions to it.
///
/// Owned by whoever renders the timeline and carried from one dataset to
/// the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollapseState {
    pub collapse_duplicates: bool,
    /// Ids whose group deliberately differs from `collapse_duplicates`
    pub overrides: BTreeSet<ItemId>,
}

impl CollapseState {
    pub fn new(collapse_duplicates: bool) -> Self {
        Self {
            collapse_duplicates,
            overrides: BTreeSet::new(),
        }
    }

    fn collapses(&self, group: &DuplicateGroup) -> bool {
        self.collapse_duplicates ^ group.ids().any(|id| self.overrides.contains(&id))
    }
}

/// One group found by the grouping pass
#[derive(Debug, Clone)]
struct DuplicateGroup {
    representative: ItemId,
    members: Vec<ItemId>,
}

impl DuplicateGroup {
    fn ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        std::iter::once(self.representative).chain(self.members.iter().copied())
    }

    fn contains(&self, id: ItemId) -> bool {
        self.representative == id || self.members.contains(&id)
    }
}

/// Open group during the scan; positions index the display sequence
struct OpenGroup {
    representative: usize,
    members: Vec<usize>,
}

/// Hides near-duplicate items under a representative.
///
/// Items are compared only with groups opened within the last
/// `max_distance + 1` groups of the display sequence. A distance below 1
/// turns collapsing off.
pub struct DuplicateCollapser {
    max_distance: usize,
    policy: Arc<dyn DuplicationPolicy>,
    preferred_origin: Option<i64>,
}

impl DuplicateCollapser {
    pub fn new(max_distance: usize, policy: Arc<dyn DuplicationPolicy>) -> Self {
        Self {
            max_distance,
            policy,
            preferred_origin: None,
        }
    }

    pub fn with_preferred_origin(mut self, origin_id: i64) -> Self {
        self.preferred_origin = Some(origin_id);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.max_distance >= 1
    }

    /// Group `dataset` from scratch and collapse the groups `state` asks for
    pub fn apply(&self, mut dataset: TimelineDataset, state: CollapseState) -> (TimelineDataset, CollapseState) {
        self.recollapse(&mut dataset, &state);
        (dataset, state)
    }

    /// In-place form of [`apply`](Self::apply)
    pub fn recollapse(&self, dataset: &mut TimelineDataset, state: &CollapseState) {
        if !self.is_enabled() {
            return;
        }
        dataset.expand_all();
        let groups = self.group(dataset);
        self.collapse_groups(dataset, &groups, state);
    }

    /// Change the global default; drops every per-item override
    pub fn toggle_all(&self, dataset: &mut TimelineDataset, state: &mut CollapseState, collapse: bool) {
        state.collapse_duplicates = collapse;
        state.overrides.clear();
        self.recollapse(dataset, state);
    }

    /// Collapse or expand only the group containing `id`. The choice is kept
    /// as an override when it differs from the global default.
    pub fn toggle_one(&self, dataset: &mut TimelineDataset, state: &mut CollapseState, id: ItemId, collapse: bool) {
        if !self.is_enabled() {
            return;
        }
        dataset.expand_all();
        let groups = self.group(dataset);
        if let Some(group) = groups.iter().find(|group| group.contains(id)) {
            for member in group.ids() {
                state.overrides.remove(&member);
            }
            if collapse != state.collapse_duplicates {
                state.overrides.insert(id);
                if group.representative == id {
                    state.overrides.extend(group.members.iter().copied());
                }
            }
        }
        self.collapse_groups(dataset, &groups, state);
    }

    /// Show the duplicates of the group `id` belongs to (as representative or
    /// as hidden duplicate). Overrides are left alone.
    pub fn expand(&self, dataset: &mut TimelineDataset, id: ItemId) -> bool {
        let representative = match dataset.find_item(id) {
            Some(item) if item.is_collapsed() => Some(id),
            _ => dataset.find_representative_of(id).map(Item::id),
        };
        representative.is_some_and(|rep| dataset.expand_representative(rep))
    }

    /// Whether the item at `position` has a duplicate right next to it
    pub fn can_be_collapsed(&self, dataset: &TimelineDataset, position: usize) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let Some(item) = dataset.item(position) else {
            return false;
        };
        if item.is_collapsed() {
            return true;
        }
        let context = self.context(dataset);
        let neighbours = [
            position.checked_sub(1).and_then(|p| dataset.item(p)),
            dataset.item(position + 1),
        ];
        neighbours.into_iter().flatten().any(|other| {
            self.policy.relation_of(item, other, &context) != DuplicationRelation::None
                || self.policy.relation_of(other, item, &context) != DuplicationRelation::None
        })
    }

    fn context<'a>(&self, dataset: &'a TimelineDataset) -> RelationContext<'a> {
        RelationContext {
            timeline: dataset.timeline(),
            preferred_origin: self.preferred_origin,
        }
    }

    /// Single scan over the display sequence. Returns groups with at least
    /// one duplicate.
    fn group(&self, dataset: &TimelineDataset) -> Vec<DuplicateGroup> {
        let items: Vec<&Item> = dataset.items().collect();
        let context = self.context(dataset);
        let mut open: VecDeque<OpenGroup> = VecDeque::with_capacity(self.max_distance + 1);
        let mut closed: Vec<OpenGroup> = Vec::new();

        for (position, item) in items.iter().enumerate() {
            let mut matched = false;
            for group in open.iter_mut() {
                match self.policy.relation_of(item, items[group.representative], &context) {
                    DuplicationRelation::None => continue,
                    DuplicationRelation::Duplicates => group.members.push(position),
                    DuplicationRelation::IsDuplicated => {
                        group.members.push(group.representative);
                        group.representative = position;
                    }
                }
                matched = true;
                break;
            }
            if matched {
                continue;
            }
            if open.len() > self.max_distance {
                closed.extend(open.pop_front());
            }
            open.push_back(OpenGroup {
                representative: position,
                members: Vec::new(),
            });
        }
        closed.extend(open);

        closed
            .into_iter()
            .filter(|group| !group.members.is_empty())
            .map(|group| DuplicateGroup {
                representative: items[group.representative].id(),
                members: group.members.iter().map(|&p| items[p].id()).collect(),
            })
            .collect()
    }

    fn collapse_groups(&self, dataset: &mut TimelineDataset, groups: &[DuplicateGroup], state: &CollapseState) {
        let collapsing: Vec<&DuplicateGroup> = groups.iter().filter(|group| state.collapses(group)).collect();
        if collapsing.is_empty() {
            return;
        }

        let hidden: HashSet<ItemId> = collapsing
            .iter()
            .flat_map(|group| group.members.iter().copied())
            .collect();
        let mut taken: HashMap<ItemId, (PageId, Item)> = HashMap::with_capacity(hidden.len());
        for page in dataset.pages.iter_mut() {
            let page_id = page.id();
            let items = std::mem::take(&mut page.items);
            for item in items {
                if hidden.contains(&item.id()) {
                    taken.insert(item.id(), (page_id, item));
                } else {
                    page.items.push(item);
                }
            }
        }

        for group in &collapsing {
            let Some((page_index, index)) = dataset.locate_id(group.representative) else {
                continue;
            };
            let representative = &mut dataset.pages[page_index].items[index];
            for member in &group.members {
                if let Some((page_id, item)) = taken.remove(member) {
                    representative.push_collapsed_child(page_id, item);
                }
            }
        }
        debug!(groups = collapsing.len(), hidden = hidden.len(), "collapsed duplicates");
    }
}
