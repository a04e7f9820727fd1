//! SQLite key/value store holding the last published aggregate.
//!
//! Keys mirror what the renderers read: the aggregate JSON under
//! `playlist-data` and the snapshot id it was computed from under `snapshotId`.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::error::StoreError;
use crate::models::PlaylistAggregate;

pub const DATA_KEY: &str = "playlist-data";
pub const SNAPSHOT_KEY: &str = "snapshotId";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;

             CREATE TABLE IF NOT EXISTS kv (
                 key TEXT PRIMARY KEY,
                 value TEXT NOT NULL,
                 updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
             );",
        )?;
        Ok(Self { conn })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn previous_snapshot(&self) -> Result<Option<String>, StoreError> {
        self.get(SNAPSHOT_KEY)
    }

    /// True when the stored snapshot differs from `snapshot_id` (or none is stored).
    pub fn snapshot_changed(&self, snapshot_id: &str) -> Result<bool, StoreError> {
        Ok(self.previous_snapshot()?.as_deref() != Some(snapshot_id))
    }

    /// Write the aggregate and its snapshot id in one transaction.
    pub fn publish(&mut self, aggregate: &PlaylistAggregate) -> Result<(), StoreError> {
        let json = aggregate.to_json_pretty()?;

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
            )?;
            stmt.execute(params![DATA_KEY, json])?;
            stmt.execute(params![SNAPSHOT_KEY, aggregate.metadata.snapshot_id])?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::models::PlaylistMetadata;
    use crate::users::NoResolver;
    use chrono::Utc;
    use tempfile::TempDir;

    fn empty_aggregate(snapshot: &str) -> PlaylistAggregate {
        let metadata = PlaylistMetadata {
            name: "Mix".to_string(),
            image_url: String::new(),
            snapshot_id: snapshot.to_string(),
        };
        aggregate(&[], &metadata, &NoResolver, Utc::now()).unwrap()
    }

    #[test]
    fn test_fresh_store_reports_change() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.previous_snapshot().unwrap(), None);
        assert!(store.snapshot_changed("s1").unwrap());
    }

    #[test]
    fn test_publish_writes_data_and_snapshot() {
        let mut store = Store::open_in_memory().unwrap();
        store.publish(&empty_aggregate("s1")).unwrap();

        assert_eq!(store.previous_snapshot().unwrap().as_deref(), Some("s1"));
        assert!(!store.snapshot_changed("s1").unwrap());
        assert!(store.snapshot_changed("s2").unwrap());

        let data = store.get(DATA_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(json["metadata"]["snapshotId"], "s1");
        assert_eq!(json["duplicates"], serde_json::json!([]));
    }

    #[test]
    fn test_publish_overwrites_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("playlist.sqlite3");
        {
            let mut store = Store::open(&path).unwrap();
            store.publish(&empty_aggregate("s1")).unwrap();
            store.publish(&empty_aggregate("s2")).unwrap();
        }
        let store = Store::open(&path).unwrap();
        assert_eq!(store.previous_snapshot().unwrap().as_deref(), Some("s2"));
    }
}
