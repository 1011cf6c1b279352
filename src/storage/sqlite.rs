//! SQLite storage backend
//!
//! Single database file with a `tags` table (edge lists as JSON columns)
//! and a `file_tags` association table so `merge_tags` can reassign file
//! links in one statement. Thread-safe via internal mutex on the
//! connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

use super::traits::{OpenStore, StorageError, StorageResult, TagRecord, TagStore};
use crate::graph::TagId;

/// SQLite-backed tag store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS tags (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                date_added TEXT NOT NULL,
                color TEXT NOT NULL,
                is_hidden INTEGER NOT NULL DEFAULT 0,
                sub_tags_json TEXT NOT NULL,
                implied_tags_json TEXT NOT NULL
            );

            -- File associations live with the backend, not the graph core.
            -- The core only ever touches this table indirectly, via merge.
            CREATE TABLE IF NOT EXISTS file_tags (
                file_id TEXT NOT NULL,
                tag_id TEXT NOT NULL,
                PRIMARY KEY (file_id, tag_id)
            );
            CREATE INDEX IF NOT EXISTS idx_file_tags_tag
                ON file_tags(tag_id);

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn upsert(&self, record: &TagRecord) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO tags
                 (id, name, date_added, color, is_hidden, sub_tags_json, implied_tags_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.id.as_str(),
                record.name,
                record.date_added.to_rfc3339(),
                record.color,
                record.is_hidden,
                serde_json::to_string(&record.sub_tags)?,
                serde_json::to_string(&record.implied_tags)?,
            ],
        )?;
        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(TagRecord, String)> {
        let id: String = row.get(0)?;
        let name: String = row.get(1)?;
        let date_added: String = row.get(2)?;
        let color: String = row.get(3)?;
        let is_hidden: bool = row.get(4)?;
        let sub_tags_json: String = row.get(5)?;
        let implied_tags_json: String = row.get(6)?;
        Ok((
            TagRecord {
                id: TagId::from_string(id),
                name,
                // placeholder; parsed by the caller so a bad date maps to StorageError
                date_added: DateTime::<Utc>::UNIX_EPOCH,
                color,
                sub_tags: serde_json::from_str(&sub_tags_json).unwrap_or_default(),
                is_hidden,
                implied_tags: serde_json::from_str(&implied_tags_json).unwrap_or_default(),
            },
            date_added,
        ))
    }
}

#[async_trait]
impl TagStore for SqliteStore {
    async fn fetch_tags(&self) -> StorageResult<Vec<TagRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, date_added, color, is_hidden, sub_tags_json, implied_tags_json
             FROM tags",
        )?;
        let rows = stmt.query_map([], Self::row_to_record)?;

        let mut records = Vec::new();
        for row in rows {
            let (mut record, raw_date) = row?;
            record.date_added = DateTime::parse_from_rfc3339(&raw_date)
                .map_err(|e| StorageError::DateParse(format!("{}: {}", raw_date, e)))?
                .with_timezone(&Utc);
            records.push(record);
        }
        Ok(records)
    }

    async fn create_tag(&self, record: &TagRecord) -> StorageResult<()> {
        self.upsert(record)
    }

    async fn save_tag(&self, record: &TagRecord) -> StorageResult<()> {
        self.upsert(record)
    }

    async fn remove_tags(&self, ids: &[TagId]) -> StorageResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for id in ids {
            tx.execute("DELETE FROM tags WHERE id = ?1", params![id.as_str()])?;
            tx.execute(
                "DELETE FROM file_tags WHERE tag_id = ?1",
                params![id.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn merge_tags(&self, removed_id: &TagId, target_id: &TagId) -> StorageResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        // OR IGNORE: a file already carrying the target keeps a single row
        tx.execute(
            "INSERT OR IGNORE INTO file_tags (file_id, tag_id)
             SELECT file_id, ?2 FROM file_tags WHERE tag_id = ?1",
            params![removed_id.as_str(), target_id.as_str()],
        )?;
        tx.execute(
            "DELETE FROM file_tags WHERE tag_id = ?1",
            params![removed_id.as_str()],
        )?;
        tx.execute(
            "DELETE FROM tags WHERE id = ?1",
            params![removed_id.as_str()],
        )?;
        tx.commit()?;
        Ok(())
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}
