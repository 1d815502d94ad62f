use std::path::Path;

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::item_store::{normalized_conversation_id, ConversationRepair, ItemStore, StoreError};
use crate::constants::{files, INVALID_ID};
use crate::models::{ItemId, ItemRow, PageParams, TimelineKey, WhichPage};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    note_id TEXT UNIQUE,
    date INTEGER NOT NULL DEFAULT 0,
    parent_id INTEGER NOT NULL DEFAULT 0,
    conversation_id INTEGER NOT NULL DEFAULT 0,
    origin_id INTEGER NOT NULL DEFAULT 0,
    author TEXT NOT NULL DEFAULT '',
    body TEXT NOT NULL DEFAULT '',
    loaded INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS idx_items_conversation ON items(conversation_id);
CREATE INDEX IF NOT EXISTS idx_items_date ON items(date);
"#;

const ROW_COLUMNS: &str = "id, date, parent_id, conversation_id, origin_id, author, body";

/// SQLite-backed item store.
///
/// Rows referenced by other notes but not received yet are kept as
/// placeholders (`loaded = 0`) so they get a stable local id; they are
/// invisible to every `ItemStore` query.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) `items.db` inside `db_dir`
    pub fn open<P: AsRef<Path>>(db_dir: P) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir)?;
        let conn = Connection::open(db_dir.join(files::ITEM_DB))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or replace a fully loaded row. An id of `0` lets SQLite pick one.
    pub fn put_row(&self, row: &ItemRow) -> Result<ItemId, StoreError> {
        let conn = self.conn.lock();
        let id = if row.id == 0 { None } else { Some(row.id) };
        conn.execute(
            "INSERT INTO items (id, date, parent_id, conversation_id, origin_id, author, body, loaded)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1)
             ON CONFLICT(id) DO UPDATE SET
                date = excluded.date, parent_id = excluded.parent_id,
                conversation_id = excluded.conversation_id, origin_id = excluded.origin_id,
                author = excluded.author, body = excluded.body, loaded = 1",
            params![id, row.date, row.parent_id, row.conversation_id, row.origin_id, row.author, row.body],
        )?;
        Ok(id.unwrap_or_else(|| conn.last_insert_rowid()))
    }

    /// Local id of a note, creating a placeholder row when it is unknown
    pub fn intern_note(&self, note_id: &str) -> Result<ItemId, StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO items (note_id, loaded) VALUES (?1, 0)",
            params![note_id],
        )?;
        let id = conn.query_row(
            "SELECT id FROM items WHERE note_id = ?1",
            params![note_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Fill in a note's row, turning a placeholder into a loaded row
    pub fn upsert_note(&self, note_id: &str, row: &ItemRow) -> Result<ItemId, StoreError> {
        let id = self.intern_note(note_id)?;
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE items SET date = ?2, parent_id = ?3, conversation_id = ?4, origin_id = ?5,
                author = ?6, body = ?7, loaded = 1
             WHERE id = ?1",
            params![id, row.date, row.parent_id, row.conversation_id, row.origin_id, row.author, row.body],
        )?;
        Ok(id)
    }

    /// Set the conversation id of a row only when it has none yet
    pub fn adopt_conversation(&self, id: ItemId, conversation_id: ItemId) -> Result<(), StoreError> {
        self.conn.lock().execute(
            "UPDATE items SET conversation_id = ?2 WHERE id = ?1 AND conversation_id = 0",
            params![id, conversation_id],
        )?;
        Ok(())
    }

    pub fn note_id_of(&self, id: ItemId) -> Result<Option<String>, StoreError> {
        let note_id = self
            .conn
            .lock()
            .query_row("SELECT note_id FROM items WHERE id = ?1", params![id], |row| {
                row.get::<_, Option<String>>(0)
            })
            .optional()?;
        Ok(note_id.flatten())
    }

    pub fn id_of_note(&self, note_id: &str) -> Result<Option<ItemId>, StoreError> {
        let id = self
            .conn
            .lock()
            .query_row("SELECT id FROM items WHERE note_id = ?1", params![note_id], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    pub fn is_loaded(&self, id: ItemId) -> Result<bool, StoreError> {
        let loaded: Option<bool> = self
            .conn
            .lock()
            .query_row("SELECT loaded FROM items WHERE id = ?1", params![id], |row| row.get(0))
            .optional()?;
        Ok(loaded.unwrap_or(false))
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ItemRow> {
        Ok(ItemRow {
            id: row.get(0)?,
            date: row.get(1)?,
            parent_id: row.get(2)?,
            conversation_id: row.get(3)?,
            origin_id: row.get(4)?,
            author: row.get(5)?,
            body: row.get(6)?,
        })
    }
}

impl ItemStore for Database {
    fn get_by_id(&self, id: ItemId) -> Result<Option<ItemRow>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM items WHERE id = ?1 AND loaded = 1", ROW_COLUMNS),
                params![id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    fn get_by_conversation_id(&self, conversation_id: ItemId) -> Result<Vec<ItemRow>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM items WHERE conversation_id = ?1 AND loaded = 1 ORDER BY id",
            ROW_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![conversation_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn query_page(&self, params: &PageParams) -> Result<Vec<ItemRow>, StoreError> {
        if params.which == WhichPage::Empty || params.limit == 0 {
            return Ok(Vec::new());
        }

        let mut clauses = vec!["loaded = 1".to_string(), "id != 0".to_string()];
        let mut values: Vec<Value> = Vec::new();
        match &params.timeline {
            TimelineKey::Everything => {}
            TimelineKey::Origin(origin_id) => {
                values.push(Value::Integer(*origin_id));
                clauses.push(format!("origin_id = ?{}", values.len()));
            }
            TimelineKey::Author(author) => {
                values.push(Value::Text(author.clone()));
                clauses.push(format!("author = ?{}", values.len()));
            }
            TimelineKey::Conversation(conversation_id) => {
                values.push(Value::Integer(*conversation_id));
                clauses.push(format!("conversation_id = ?{}", values.len()));
            }
        }
        let younger = params.which == WhichPage::Younger;
        let older = params.which == WhichPage::Older;
        let has_cursor = params.cursor_id != INVALID_ID;
        if params.has_min_date() {
            values.push(Value::Integer(params.min_date));
            let date = values.len();
            if younger && has_cursor {
                values.push(Value::Integer(params.cursor_id));
                clauses.push(format!("(date > ?{date} OR (date = ?{date} AND id > ?{}))", values.len()));
            } else {
                clauses.push(format!("date >= ?{date}"));
            }
        }
        if params.has_max_date() {
            values.push(Value::Integer(params.max_date));
            let date = values.len();
            if older && has_cursor {
                values.push(Value::Integer(params.cursor_id));
                clauses.push(format!("(date < ?{date} OR (date = ?{date} AND id < ?{}))", values.len()));
            } else {
                clauses.push(format!("date <= ?{date}"));
            }
        }
        let order = if younger {
            "date ASC, id ASC"
        } else {
            "date DESC, id DESC"
        };
        values.push(Value::Integer(params.limit as i64));
        let sql = format!(
            "SELECT {} FROM items WHERE {} ORDER BY {} LIMIT ?{}",
            ROW_COLUMNS,
            clauses.join(" AND "),
            order,
            values.len()
        );

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt
            .query_map(params_from_iter(values.iter()), Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        if younger {
            rows.reverse();
        }
        Ok(rows)
    }
}

impl ConversationRepair for Database {
    fn normalize_conversation(&self, ids: &[ItemId]) -> Result<(), StoreError> {
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = self.get_by_id(*id)? {
                rows.push(row);
            }
        }
        let target = normalized_conversation_id(&rows);

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for row in &rows {
            tx.execute(
                "UPDATE items SET conversation_id = ?2 WHERE id = ?1",
                params![row.id, target],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        for row in [
            ItemRow::new(1, 100).with_conversation(1).with_origin(1),
            ItemRow::new(2, 200).with_conversation(1).with_parent(1).with_origin(2),
            ItemRow::new(3, 300).with_conversation(3).with_origin(1),
            ItemRow::new(4, 300).with_conversation(3).with_parent(3).with_origin(1),
        ] {
            db.put_row(&row).unwrap();
        }
        db
    }

    #[test]
    fn test_database_creation() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        assert!(db.get_by_id(1).unwrap().is_none());
        assert!(dir.path().join(files::ITEM_DB).exists());
    }

    #[test]
    fn test_get_by_id_and_conversation() {
        let db = seeded();
        assert_eq!(db.get_by_id(2).unwrap().unwrap().parent_id, 1);
        let ids: Vec<ItemId> = db.get_by_conversation_id(3).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[test]
    fn test_placeholder_is_invisible_until_loaded() {
        let db = Database::open_in_memory().unwrap();
        let note = "c".repeat(64);
        let id = db.intern_note(&note).unwrap();
        assert_eq!(db.intern_note(&note).unwrap(), id);
        assert!(db.get_by_id(id).unwrap().is_none());
        assert!(!db.is_loaded(id).unwrap());

        db.upsert_note(&note, &ItemRow::new(0, 500).with_body("hello"))
            .unwrap();
        let row = db.get_by_id(id).unwrap().unwrap();
        assert_eq!(row.body, "hello");
        assert_eq!(db.note_id_of(id).unwrap(), Some(note.clone()));
        assert_eq!(db.id_of_note(&note).unwrap(), Some(id));
    }

    #[test]
    fn test_query_page_matches_memory_semantics() {
        let db = seeded();
        let youngest = PageParams::new(TimelineKey::Origin(1), WhichPage::Youngest).with_limit(2);
        let ids: Vec<ItemId> = db.query_page(&youngest).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4, 3]);

        let younger = PageParams::new(TimelineKey::Everything, WhichPage::Younger)
            .with_min_date(150)
            .with_limit(2);
        let ids: Vec<ItemId> = db.query_page(&younger).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2]);

        let older = PageParams::new(TimelineKey::Everything, WhichPage::Older).with_max_date(200);
        let ids: Vec<ItemId> = db.query_page(&older).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_query_page_cursor_splits_tied_dates() {
        let db = seeded();
        let older = PageParams::new(TimelineKey::Everything, WhichPage::Older)
            .with_max_date(300)
            .with_cursor_id(4);
        let ids: Vec<ItemId> = db.query_page(&older).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let younger = PageParams::new(TimelineKey::Everything, WhichPage::Younger)
            .with_min_date(300)
            .with_cursor_id(3);
        let ids: Vec<ItemId> = db.query_page(&younger).unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![4]);

        let rows: Vec<ItemRow> = (1..=4).filter_map(|id| db.get_by_id(id).unwrap()).collect();
        for params in [older, younger] {
            let expected: Vec<ItemId> = params.select_rows(&rows).iter().map(|r| r.id).collect();
            let ids: Vec<ItemId> = db.query_page(&params).unwrap().iter().map(|r| r.id).collect();
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn test_normalize_conversation() {
        let db = seeded();
        db.normalize_conversation(&[1, 2, 3, 4]).unwrap();
        for id in 1..=4 {
            assert_eq!(db.get_by_id(id).unwrap().unwrap().conversation_id, 1);
        }
    }

    #[test]
    fn test_adopt_conversation_keeps_existing() {
        let db = seeded();
        db.adopt_conversation(2, 9).unwrap();
        assert_eq!(db.get_by_id(2).unwrap().unwrap().conversation_id, 1);

        let id = db.put_row(&ItemRow::new(0, 10)).unwrap();
        db.adopt_conversation(id, 9).unwrap();
        assert_eq!(db.get_by_id(id).unwrap().unwrap().conversation_id, 9);
    }
}
