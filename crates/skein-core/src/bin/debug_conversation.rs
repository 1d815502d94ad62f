use std::sync::Arc;

use anyhow::{Context, Result};
use skein_core::config::ConversationSettings;
use skein_core::conversation::{sort_for_display, ConversationCache};
use skein_core::store::Database;
use skein_core::ConversationTreeBuilder;

/// Usage: debug_conversation <item id | note hex id> [data dir]
fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let selected = args.next().context("usage: debug_conversation <item id | note id> [data dir]")?;
    let data_dir = args.next().unwrap_or_else(|| "skein_data".to_string());

    println!("Building conversation from {}...\n", data_dir);
    let db = Arc::new(Database::open(&data_dir)?);

    let selected_id = match selected.parse::<i64>() {
        Ok(id) => id,
        Err(_) => db
            .id_of_note(&selected)?
            .with_context(|| format!("note {} is not in the store", selected))?,
    };

    let builder = ConversationTreeBuilder::new(db.clone(), ConversationSettings::default()).with_repair(db.clone());
    let cache = ConversationCache::new();
    let mut build = builder.build_with_cache(&cache, selected_id, false, false);
    sort_for_display(&mut build.items);

    println!(
        "{} items, {} missing, repaired: {}\n",
        build.items.len(),
        build.missing.len(),
        build.repaired
    );
    for item in &build.items {
        let note = db.note_id_of(item.id())?.unwrap_or_default();
        let preview: String = item.row.body.chars().take(60).collect();
        println!(
            "#{:<4} {}{} lvl={} replies={} conv={} {} {}",
            item.tree.history_order,
            "  ".repeat(item.tree.indent_level as usize),
            item.id(),
            item.tree.reply_level,
            item.tree.reply_count,
            item.conversation_id(),
            &note[..16.min(note.len())],
            preview.replace('\n', " ")
        );
    }
    if !build.missing.is_empty() {
        println!("\nMissing ids: {:?}", build.missing);
    }
    Ok(())
}
