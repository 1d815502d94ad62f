use std::time::Duration;

use anyhow::{Context, Result};
use nostr_sdk::prelude::*;
use tracing::{debug, error};

use super::db::Database;
use super::item_store::StoreError;
use crate::constants::kinds;
use crate::models::{ItemId, ItemRow};

/// NIP-10 thread references of a text note (hex event ids)
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ThreadRefs {
    pub root: Option<String>,
    pub reply: Option<String>,
}

impl ThreadRefs {
    /// Direct parent: the reply marker, or the root for first-level replies
    pub fn parent(&self) -> Option<&str> {
        self.reply.as_deref().or(self.root.as_deref())
    }
}

/// Read the e-tags of `event`.
/// - e-tag with "root" marker = thread root
/// - e-tag with "reply" marker = direct parent
/// - unmarked e-tags: first is the root, the next one the parent
pub fn thread_refs(event: &Event) -> ThreadRefs {
    let mut refs = ThreadRefs::default();
    for tag in event.tags.iter() {
        let slice = tag.as_slice();
        if slice.first().map(|s| s.as_str()) != Some("e") {
            continue;
        }
        let Some(event_id) = slice.get(1).filter(|id| is_event_id(id)) else {
            continue;
        };
        match slice.get(3).map(|s| s.as_str()) {
            Some("root") => refs.root = Some(event_id.clone()),
            Some("reply") => refs.reply = Some(event_id.clone()),
            None | Some("") => {
                if refs.root.is_none() {
                    refs.root = Some(event_id.clone());
                } else {
                    refs.reply = Some(event_id.clone());
                }
            }
            _ => {}
        }
    }
    refs
}

fn is_event_id(value: &str) -> bool {
    hex::decode(value).map(|bytes| bytes.len() == 32).unwrap_or(false)
}

/// Parse one JSON event per line, skipping blank lines
pub fn parse_events_jsonl(content: &str) -> Result<Vec<Event>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            Event::from_json(line.trim())
                .with_context(|| format!("Invalid event JSON on line {}", index + 1))
        })
        .collect()
}

/// Ingest kind:1 text notes into the item store.
/// - origin_id: the account/relay the events were received from
///
/// Referenced notes that are not known yet get placeholder rows. Returns the
/// number of notes newly stored.
pub fn ingest_events(db: &Database, events: &[Event], origin_id: i64) -> Result<usize> {
    const MAX_ATTEMPTS: usize = 5;
    let mut ingested = 0;

    for event in events {
        if event.kind.as_u16() != kinds::TEXT_NOTE {
            continue;
        }

        let mut last_error: Option<StoreError> = None;
        let mut handled = false;
        for attempt in 0..MAX_ATTEMPTS {
            match ingest_note(db, event, origin_id) {
                Ok(stored) => {
                    if stored {
                        ingested += 1;
                    }
                    handled = true;
                    break;
                }
                Err(err) => last_error = Some(err),
            }

            // SQLite may be busy when another connection writes
            if attempt + 1 < MAX_ATTEMPTS {
                let delay_ms = match attempt {
                    0..=1 => 5,
                    2..=3 => 15,
                    _ => 30,
                };
                std::thread::sleep(Duration::from_millis(delay_ms));
            }
        }

        if !handled {
            let err_text = last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown ingest failure".to_string());
            error!(id = %event.id.to_hex(), err = %err_text, "ingest_events exhausted retries");
            return Err(anyhow::anyhow!(
                "failed to ingest id={} after {} attempts: {}",
                event.id.to_hex(),
                MAX_ATTEMPTS,
                err_text
            ));
        }
    }

    Ok(ingested)
}

/// Store one note; `Ok(false)` when it was already loaded
fn ingest_note(db: &Database, event: &Event, origin_id: i64) -> Result<bool, StoreError> {
    let note_id = event.id.to_hex();
    if let Some(id) = db.id_of_note(&note_id)? {
        if db.is_loaded(id)? {
            return Ok(false);
        }
    }

    let refs = thread_refs(event);
    let id = db.intern_note(&note_id)?;
    let conversation_id: ItemId = match refs.root.as_deref() {
        Some(root) => {
            let root_id = db.intern_note(root)?;
            db.adopt_conversation(root_id, root_id)?;
            root_id
        }
        None => id,
    };
    let parent_id = match refs.parent() {
        Some(parent) => {
            let parent_id = db.intern_note(parent)?;
            db.adopt_conversation(parent_id, conversation_id)?;
            parent_id
        }
        None => 0,
    };

    let row = ItemRow::new(id, event.created_at.as_secs() as i64)
        .with_parent(parent_id)
        .with_conversation(conversation_id)
        .with_origin(origin_id)
        .with_author(event.pubkey.to_hex())
        .with_body(event.content.clone());
    db.upsert_note(&note_id, &row)?;
    debug!(id, parent_id, conversation_id, "ingested note");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ItemStore;

    fn e_tag(values: Vec<String>) -> Tag {
        Tag::custom(
            TagKind::SingleLetter(SingleLetterTag::lowercase(Alphabet::E)),
            values,
        )
    }

    #[test]
    fn test_thread_refs_with_markers() {
        let keys = Keys::generate();
        let root = "a".repeat(64);
        let parent = "b".repeat(64);
        let event = EventBuilder::new(Kind::from(1), "Reply content")
            .tag(e_tag(vec![root.clone(), "".to_string(), "root".to_string()]))
            .tag(e_tag(vec![parent.clone(), "".to_string(), "reply".to_string()]))
            .sign_with_keys(&keys)
            .unwrap();

        let refs = thread_refs(&event);
        assert_eq!(refs.root, Some(root));
        assert_eq!(refs.parent(), Some(parent.as_str()));
    }

    #[test]
    fn test_thread_refs_backwards_compat_no_markers() {
        let keys = Keys::generate();
        let root = "a".repeat(64);
        let parent = "b".repeat(64);
        let event = EventBuilder::new(Kind::from(1), "Old style")
            .tag(e_tag(vec![root.clone()]))
            .tag(e_tag(vec![parent.clone()]))
            .sign_with_keys(&keys)
            .unwrap();

        let refs = thread_refs(&event);
        assert_eq!(refs.root, Some(root));
        assert_eq!(refs.reply, Some(parent));
    }

    #[test]
    fn test_thread_refs_ignore_malformed_ids() {
        let keys = Keys::generate();
        let event = EventBuilder::new(Kind::from(1), "Bad tag")
            .tag(e_tag(vec!["not-an-id".to_string()]))
            .sign_with_keys(&keys)
            .unwrap();
        assert_eq!(thread_refs(&event), ThreadRefs::default());
    }

    #[test]
    fn test_ingest_thread_with_missing_root() {
        let db = Database::open_in_memory().unwrap();
        let keys = Keys::generate();
        let root = "a".repeat(64);

        let reply = EventBuilder::new(Kind::from(1), "first reply")
            .tag(e_tag(vec![root.clone(), "".to_string(), "root".to_string()]))
            .sign_with_keys(&keys)
            .unwrap();

        let ingested = ingest_events(&db, std::slice::from_ref(&reply), 1).unwrap();
        assert_eq!(ingested, 1);

        let reply_id = db.id_of_note(&reply.id.to_hex()).unwrap().unwrap();
        let root_id = db.id_of_note(&root).unwrap().unwrap();
        let row = db.get_by_id(reply_id).unwrap().unwrap();
        assert_eq!(row.parent_id, root_id);
        assert_eq!(row.conversation_id, root_id);
        assert_eq!(row.origin_id, 1);
        assert!(db.get_by_id(root_id).unwrap().is_none(), "root is only a placeholder");

        // Ingesting again is a no-op
        assert_eq!(ingest_events(&db, &[reply], 1).unwrap(), 0);
    }

    #[test]
    fn test_ingest_root_after_reply_fills_placeholder() {
        let db = Database::open_in_memory().unwrap();
        let keys = Keys::generate();
        let root = EventBuilder::new(Kind::from(1), "root note")
            .sign_with_keys(&keys)
            .unwrap();
        let reply = EventBuilder::new(Kind::from(1), "reply")
            .tag(e_tag(vec![root.id.to_hex(), "".to_string(), "root".to_string()]))
            .sign_with_keys(&keys)
            .unwrap();

        ingest_events(&db, &[reply.clone()], 1).unwrap();
        ingest_events(&db, &[root.clone()], 1).unwrap();

        let root_id = db.id_of_note(&root.id.to_hex()).unwrap().unwrap();
        let rows = db.get_by_conversation_id(root_id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(db.get_by_id(root_id).unwrap().unwrap().body, "root note");
    }

    #[test]
    fn test_ingest_skips_other_kinds() {
        let db = Database::open_in_memory().unwrap();
        let keys = Keys::generate();
        let metadata = EventBuilder::new(Kind::Custom(0), "{}")
            .sign_with_keys(&keys)
            .unwrap();
        assert_eq!(ingest_events(&db, &[metadata], 1).unwrap(), 0);
    }

    #[test]
    fn test_parse_events_jsonl() {
        let keys = Keys::generate();
        let a = EventBuilder::new(Kind::from(1), "a").sign_with_keys(&keys).unwrap();
        let b = EventBuilder::new(Kind::from(1), "b").sign_with_keys(&keys).unwrap();
        let content = format!("{}\n\n{}\n", a.as_json(), b.as_json());

        let events = parse_events_jsonl(&content).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].content, "b");

        let err = parse_events_jsonl("{broken").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
