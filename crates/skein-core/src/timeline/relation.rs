use crate::models::{Item, TimelineKey};

/// How an item relates to an existing group representative
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicationRelation {
    None,
    /// The item duplicates the representative and joins its group
    Duplicates,
    /// The representative duplicates the item: the item takes over the group
    IsDuplicated,
}

/// Facts about the timeline a comparison happens in
#[derive(Debug, Clone, Copy)]
pub struct RelationContext<'a> {
    pub timeline: &'a TimelineKey,
    /// Origin whose copy of a duplicate should be shown, if any
    pub preferred_origin: Option<i64>,
}

/// Caller-supplied comparison policy. Must be pure: the collapser calls it
/// repeatedly and expects the same answer for the same inputs.
pub trait DuplicationPolicy: Send + Sync {
    fn relation_of(&self, item: &Item, representative: &Item, context: &RelationContext<'_>) -> DuplicationRelation;
}

impl<F> DuplicationPolicy for F
where
    F: Fn(&Item, &Item, &RelationContext<'_>) -> DuplicationRelation + Send + Sync,
{
    fn relation_of(&self, item: &Item, representative: &Item, context: &RelationContext<'_>) -> DuplicationRelation {
        self(item, representative, context)
    }
}

/// Treats items with the same text as duplicates (reposts, cross-posts of
/// one note seen through several origins).
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentDuplication {
    /// Only items at most this many seconds apart are compared
    pub max_date_distance: Option<i64>,
}

impl ContentDuplication {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn within(max_date_distance: i64) -> Self {
        Self {
            max_date_distance: Some(max_date_distance),
        }
    }
}

fn normalized_body(body: &str) -> String {
    body.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

impl DuplicationPolicy for ContentDuplication {
    fn relation_of(&self, item: &Item, representative: &Item, context: &RelationContext<'_>) -> DuplicationRelation {
        if item.id() == representative.id() {
            return DuplicationRelation::None;
        }
        if let Some(max) = self.max_date_distance {
            if (item.date() - representative.date()).abs() > max {
                return DuplicationRelation::None;
            }
        }
        let body = normalized_body(&item.row.body);
        if body.is_empty() || body != normalized_body(&representative.row.body) {
            return DuplicationRelation::None;
        }

        if let Some(origin) = context.preferred_origin {
            let item_preferred = item.row.origin_id == origin;
            let rep_preferred = representative.row.origin_id == origin;
            if item_preferred != rep_preferred {
                return if item_preferred {
                    DuplicationRelation::IsDuplicated
                } else {
                    DuplicationRelation::Duplicates
                };
            }
        }
        if item.tree.reply_count > representative.tree.reply_count {
            DuplicationRelation::IsDuplicated
        } else {
            DuplicationRelation::Duplicates
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemRow;

    fn item(id: i64, origin: i64, body: &str) -> Item {
        Item::from_row(ItemRow::new(id, 100 + id).with_origin(origin).with_body(body))
    }

    fn context(timeline: &TimelineKey, preferred_origin: Option<i64>) -> RelationContext<'_> {
        RelationContext {
            timeline,
            preferred_origin,
        }
    }

    #[test]
    fn test_same_text_ignoring_case_and_spacing() {
        let timeline = TimelineKey::Everything;
        let ctx = context(&timeline, None);
        let relation = ContentDuplication::new();
        assert_eq!(
            relation.relation_of(&item(2, 1, "Hello   World"), &item(1, 1, "hello world"), &ctx),
            DuplicationRelation::Duplicates
        );
        assert_eq!(
            relation.relation_of(&item(2, 1, "hello"), &item(1, 1, "world"), &ctx),
            DuplicationRelation::None
        );
        assert_eq!(
            relation.relation_of(&item(2, 1, "  "), &item(1, 1, ""), &ctx),
            DuplicationRelation::None
        );
    }

    #[test]
    fn test_preferred_origin_takes_over() {
        let timeline = TimelineKey::Everything;
        let ctx = context(&timeline, Some(2));
        let relation = ContentDuplication::new();
        assert_eq!(
            relation.relation_of(&item(2, 2, "same"), &item(1, 1, "same"), &ctx),
            DuplicationRelation::IsDuplicated
        );
        assert_eq!(
            relation.relation_of(&item(2, 1, "same"), &item(1, 2, "same"), &ctx),
            DuplicationRelation::Duplicates
        );
    }

    #[test]
    fn test_more_replies_takes_over() {
        let timeline = TimelineKey::Everything;
        let ctx = context(&timeline, None);
        let mut popular = item(2, 1, "same");
        popular.tree.reply_count = 3;
        assert_eq!(
            ContentDuplication::new().relation_of(&popular, &item(1, 1, "same"), &ctx),
            DuplicationRelation::IsDuplicated
        );
    }

    #[test]
    fn test_date_window() {
        let timeline = TimelineKey::Everything;
        let ctx = context(&timeline, None);
        let relation = ContentDuplication::within(5);
        assert_eq!(
            relation.relation_of(&item(20, 1, "same"), &item(1, 1, "same"), &ctx),
            DuplicationRelation::None
        );
        assert_eq!(
            relation.relation_of(&item(3, 1, "same"), &item(1, 1, "same"), &ctx),
            DuplicationRelation::Duplicates
        );
    }

    #[test]
    fn test_closures_are_policies() {
        let timeline = TimelineKey::Everything;
        let ctx = context(&timeline, None);
        let never = |_: &Item, _: &Item, _: &RelationContext<'_>| DuplicationRelation::None;
        assert_eq!(
            never.relation_of(&item(1, 1, "a"), &item(2, 1, "a"), &ctx),
            DuplicationRelation::None
        );
    }
}
