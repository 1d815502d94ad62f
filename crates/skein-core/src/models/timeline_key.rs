use std::fmt;

use serde::{Deserialize, Serialize};

use super::item::{ItemId, ItemRow};

/// Identity of a logical timeline. Selects rows for page queries and decides
/// whether a rebuilt dataset may be seeded from the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum TimelineKey {
    Everything,
    Origin(i64),
    Author(String),
    Conversation(ItemId),
}

impl TimelineKey {
    pub fn matches(&self, row: &ItemRow) -> bool {
        match self {
            TimelineKey::Everything => true,
            TimelineKey::Origin(origin_id) => row.origin_id == *origin_id,
            TimelineKey::Author(author) => row.author == *author,
            TimelineKey::Conversation(conversation_id) => row.conversation_id == *conversation_id,
        }
    }

    /// Stable string used as the key in persisted view state
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TimelineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelineKey::Everything => write!(f, "everything"),
            TimelineKey::Origin(id) => write!(f, "origin:{}", id),
            TimelineKey::Author(author) => write!(f, "author:{}", author),
            TimelineKey::Conversation(id) => write!(f, "conversation:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        let row = ItemRow::new(5, 10)
            .with_origin(2)
            .with_author("alice")
            .with_conversation(3);
        assert!(TimelineKey::Everything.matches(&row));
        assert!(TimelineKey::Origin(2).matches(&row));
        assert!(!TimelineKey::Origin(1).matches(&row));
        assert!(TimelineKey::Author("alice".into()).matches(&row));
        assert!(!TimelineKey::Author("bob".into()).matches(&row));
        assert!(TimelineKey::Conversation(3).matches(&row));
    }

    #[test]
    fn test_storage_keys_are_distinct() {
        assert_eq!(TimelineKey::Everything.storage_key(), "everything");
        assert_eq!(TimelineKey::Origin(4).storage_key(), "origin:4");
        assert_ne!(
            TimelineKey::Origin(4).storage_key(),
            TimelineKey::Conversation(4).storage_key()
        );
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_string(&TimelineKey::Author("bob".into())).unwrap();
        assert_eq!(json, r#"{"kind":"author","value":"bob"}"#);
        let back: TimelineKey = serde_json::from_str(r#"{"kind":"everything"}"#).unwrap();
        assert_eq!(back, TimelineKey::Everything);
    }
}
