//! Rank and indent assignment for a built conversation.
//!
//! Phase A sorts items by descending reply level, then descending date, then
//! descending id. Phase B walks that list from its shallow end and ranks each
//! unranked item with a pre-order walk of its replies.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::constants::MAX_INDENT_LEVEL;
use crate::models::{Item, ItemId};

fn phase_a_cmp(a: &Item, b: &Item) -> Ordering {
    b.tree
        .reply_level
        .cmp(&a.tree.reply_level)
        .then_with(|| b.date().cmp(&a.date()))
        .then_with(|| b.id().cmp(&a.id()))
}

/// Assign `list_order`, `history_order`, `indent_level` and
/// `parent_reply_count` to every item. `reply_level` and `reply_count` must
/// already be set. Leaves `items` in Phase-A order.
pub fn assign_order(items: &mut [Item]) {
    items.sort_by(phase_a_cmp);

    // Replies of each parent, scanned from the tail of the Phase-A list
    let mut replies_of: HashMap<ItemId, Vec<usize>> = HashMap::new();
    for (index, item) in items.iter().enumerate().rev() {
        replies_of.entry(item.parent_id()).or_default().push(index);
    }

    let mut ranked: HashSet<ItemId> = HashSet::with_capacity(items.len());
    let mut list_order: i64 = -1;
    let mut history_order: u32 = 1;

    for start in (0..items.len()).rev() {
        if ranked.contains(&items[start].id()) {
            continue;
        }

        let mut stack: Vec<(usize, u32)> = vec![(start, 0)];
        while let Some((index, indent)) = stack.pop() {
            let id = items[index].id();
            if !ranked.insert(id) {
                continue;
            }

            let item = &mut items[index];
            item.tree.list_order = list_order;
            item.tree.history_order = history_order;
            item.tree.indent_level = indent;
            list_order -= 1;
            history_order += 1;

            let reply_count = item.tree.reply_count;
            let mut child_indent = indent;
            if (reply_count > 1 || item.tree.parent_reply_count > 1) && child_indent < MAX_INDENT_LEVEL {
                child_indent += 1;
            }

            // Pushed in reverse so the first reply is popped first
            let replies: Vec<usize> = replies_of
                .get(&id)
                .map(|indices| {
                    indices
                        .iter()
                        .copied()
                        .filter(|&i| !ranked.contains(&items[i].id()))
                        .collect()
                })
                .unwrap_or_default();
            for &reply in replies.iter().rev() {
                items[reply].tree.parent_reply_count = reply_count;
                stack.push((reply, child_indent));
            }
        }
    }
}

/// Display order: the first ranked item first
pub fn sort_for_display(items: &mut [Item]) {
    items.sort_by(|a, b| b.tree.list_order.cmp(&a.tree.list_order));
}
