use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use skein_core::conversation::{sort_for_display, ConversationCache};
use skein_core::models::ViewStateStorage;
use skein_core::remote::{ChannelFetcher, FetchRequest};
use skein_core::runtime::ListRuntime;
use skein_core::store::{ingest_events, parse_events_jsonl, Database};
use skein_core::timeline::{ContentDuplication, DuplicateCollapser, PageLoader};
use skein_core::{ConversationTreeBuilder, CoreConfig, Item, ItemId, TimelineKey, TimelineView, WhichPage};
use tracing::{info, warn};

use crate::util::{format_date, preview, short_hex};

const PREVIEW_CHARS: usize = 72;

pub(crate) struct ConversationArgs {
    pub id: String,
    pub offline: bool,
    pub resync: bool,
    pub json: bool,
}

pub(crate) struct TimelineArgs {
    pub origin: Option<i64>,
    pub author: Option<String>,
    pub older: usize,
    pub expand: bool,
    pub collapse: bool,
    pub json: bool,
}

fn open_store(config: &CoreConfig) -> Result<Arc<Database>> {
    let db = Database::open(&config.data_dir)
        .with_context(|| format!("Failed to open item store in {}", config.data_dir.display()))?;
    Ok(Arc::new(db))
}

pub(crate) fn run_import(config: &CoreConfig, file: &Path, origin: i64) -> Result<()> {
    let content =
        std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let events = parse_events_jsonl(&content)?;
    let db = open_store(config)?;
    let imported = ingest_events(&db, &events, origin)?;
    info!(file = %file.display(), events = events.len(), imported, "import finished");
    println!("Imported {} of {} events", imported, events.len());
    Ok(())
}

/// Local id, or the local id of a hex note id
fn resolve_id(db: &Database, id: &str) -> Result<ItemId> {
    if let Ok(local) = id.parse::<ItemId>() {
        return Ok(local);
    }
    db.id_of_note(id)?
        .with_context(|| format!("Note {} is not in the store", id))
}

pub(crate) fn run_conversation(config: &CoreConfig, args: ConversationArgs) -> Result<()> {
    let db = open_store(config)?;
    let selected_id = resolve_id(&db, &args.id)?;

    let (fetcher, fetch_rx) = ChannelFetcher::new();
    let builder = ConversationTreeBuilder::new(db.clone(), config.conversation.clone())
        .with_repair(db.clone())
        .with_fetcher(Arc::new(fetcher));
    let allow_remote_fetch = !args.offline && config.conversation.allow_remote_fetch;
    let mut build = builder.build_with_cache(&ConversationCache::new(), selected_id, allow_remote_fetch, args.resync);
    sort_for_display(&mut build.items);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&build.items)?);
    } else {
        if build.items.is_empty() {
            println!("Item {} is not in the store", selected_id);
        }
        for item in &build.items {
            let marker = if item.id() == selected_id { ">" } else { " " };
            println!(
                "{}{:>4} {}{} {}  {}",
                marker,
                item.tree.history_order,
                "  ".repeat(item.tree.indent_level as usize),
                format_date(item.date()),
                short_hex(&item.row.author),
                preview(&item.row.body, PREVIEW_CHARS)
            );
        }
        if build.repaired {
            println!("(conversation ids were repaired)");
        }
    }

    // No network layer here: report what a syncing front end would fetch
    for request in fetch_rx.try_iter() {
        match request {
            FetchRequest::Item(id) => {
                let note = db.note_id_of(id)?.unwrap_or_else(|| id.to_string());
                eprintln!("fetch requested: note {}", note);
            }
            FetchRequest::Conversation(id) => {
                let note = db.note_id_of(id)?.unwrap_or_else(|| id.to_string());
                eprintln!("fetch requested: conversation {}", note);
            }
        }
    }
    Ok(())
}

fn timeline_key(args: &TimelineArgs) -> TimelineKey {
    match (args.origin, &args.author) {
        (Some(origin), _) => TimelineKey::Origin(origin),
        (None, Some(author)) => TimelineKey::Author(author.clone()),
        (None, None) => TimelineKey::Everything,
    }
}

pub(crate) fn run_timeline(config: &CoreConfig, args: TimelineArgs) -> Result<()> {
    let db = open_store(config)?;
    let settings = &config.timeline;
    let key = timeline_key(&args);

    let collapser = Arc::new(DuplicateCollapser::new(
        settings.max_distance_between_duplicates,
        Arc::new(ContentDuplication::new()),
    ));
    let mut view = TimelineView::new(key.clone(), settings, collapser.clone());

    let mut view_states = ViewStateStorage::new(&config.data_dir);
    if let Some(err) = view_states.last_error() {
        warn!(error = %err, "ignoring saved view state");
    }
    if let Some(saved) = view_states.get(&key) {
        view.restore(saved);
    }

    let mut runtime = ListRuntime::spawn(
        PageLoader::new(db.clone(), settings.clone()),
        collapser,
        Arc::new(ConversationTreeBuilder::new(db.clone(), config.conversation.clone())),
    );
    let events = runtime.take_event_rx().context("List worker events already taken")?;
    let handle = runtime.handle();

    let steps = std::iter::once(WhichPage::Youngest).chain(std::iter::repeat(WhichPage::Older).take(args.older));
    for which in steps {
        if which == WhichPage::Older && !view.snapshot().may_have_older_page() {
            break;
        }
        view.request(&handle, which)
            .map_err(|_| anyhow!("List worker stopped"))?;
        let event = events.recv().context("List worker stopped")?;
        view.handle_event(event);
    }
    runtime.shutdown();

    if args.expand {
        view.toggle_all(false);
    } else if args.collapse {
        view.toggle_all(true);
    }

    let snapshot = view.snapshot();
    if args.json {
        let items: Vec<&Item> = snapshot.items().collect();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for (position, item) in snapshot.items().enumerate() {
            let hidden = match item.collapsed_count() {
                0 if view.can_be_collapsed(position) => "  ~ ".to_string(),
                0 => "    ".to_string(),
                n => format!("{:>3} ", format!("+{}", n)),
            };
            println!(
                "{} {}{}  {}",
                format_date(item.date()),
                hidden,
                short_hex(&item.row.author),
                preview(&item.row.body, PREVIEW_CHARS)
            );
        }
        println!(
            "{} items in {} pages{}",
            snapshot.len(),
            snapshot.pages().len(),
            if snapshot.may_have_older_page() { ", more below" } else { "" }
        );
    }

    view_states
        .save(&key, view.view_state(0, 0))
        .context("Failed to save view state")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_timeline_key_from_flags() {
        let mut args = TimelineArgs {
            origin: None,
            author: None,
            older: 0,
            expand: false,
            collapse: false,
            json: false,
        };
        assert_eq!(timeline_key(&args), TimelineKey::Everything);
        args.author = Some("ab".to_string());
        assert_eq!(timeline_key(&args), TimelineKey::Author("ab".to_string()));
        args.origin = Some(3);
        assert_eq!(timeline_key(&args), TimelineKey::Origin(3));
    }

    #[test]
    fn test_resolve_id() {
        let dir = tempdir().unwrap();
        let config = CoreConfig::new(dir.path());
        let db = open_store(&config).unwrap();
        let note = "aa".repeat(32);
        let local = db.intern_note(&note).unwrap();

        assert_eq!(resolve_id(&db, "42").unwrap(), 42);
        assert_eq!(resolve_id(&db, &note).unwrap(), local);
        assert!(resolve_id(&db, &"bb".repeat(32)).is_err());
    }

    #[test]
    fn test_timeline_saves_view_state() {
        let dir = tempdir().unwrap();
        let config = CoreConfig::new(dir.path());
        let args = TimelineArgs {
            origin: None,
            author: None,
            older: 1,
            expand: true,
            collapse: false,
            json: false,
        };
        run_timeline(&config, args).unwrap();

        let saved = ViewStateStorage::new(dir.path());
        let state = saved.get(&TimelineKey::Everything).unwrap();
        assert_eq!(state.collapse_duplicates, Some(false));
    }
}
