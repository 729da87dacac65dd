use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{Connection, OptionalExtension, params};

use crate::backend::KeyValueStore;
use crate::error::StoreResult;

/// SQLite-backed key-value medium for the tracker's stored documents.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv_store (
                    key TEXT PRIMARY KEY NOT NULL,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    fn upsert(conn: &Connection, key: &str, value: &str, now: &str) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let now = Local::now().to_rfc3339();
        Self::upsert(&self.conn, key, value, &now)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> StoreResult<()> {
        let now = Local::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;
        for (key, value) in entries {
            Self::upsert(&tx, key, value, &now)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM kv_store ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kv_set_get() {
        let db = Database::open_in_memory().unwrap();
        db.set("test_key", "test_value").unwrap();
        let val = db.get("test_key").unwrap();
        assert_eq!(val.as_deref(), Some("test_value"));
    }

    #[test]
    fn test_kv_get_nonexistent() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get("nonexistent").unwrap().is_none());
    }

    #[test]
    fn test_kv_upsert() {
        let db = Database::open_in_memory().unwrap();
        db.set("key", "value1").unwrap();
        db.set("key", "value2").unwrap();
        assert_eq!(db.get("key").unwrap().as_deref(), Some("value2"));
        assert_eq!(db.keys().unwrap(), vec!["key".to_string()]);
    }

    #[test]
    fn test_kv_remove() {
        let db = Database::open_in_memory().unwrap();
        db.set("key", "value").unwrap();
        db.remove("key").unwrap();
        assert!(db.get("key").unwrap().is_none());
        // Removing again is fine
        db.remove("key").unwrap();
    }

    #[test]
    fn test_kv_set_many() {
        let db = Database::open_in_memory().unwrap();
        db.set("b", "old").unwrap();
        db.set_many(&[("a", "1"), ("b", "2")]).unwrap();
        assert_eq!(db.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(db.get("b").unwrap().as_deref(), Some("2"));
        assert_eq!(db.keys().unwrap(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_migration_creates_kv_table() {
        let db = Database::open_in_memory().unwrap();
        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
        let version: i64 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_reopen_file_keeps_data() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("carbs.db");
        {
            let db = Database::open(&path).unwrap();
            db.set("carbs-tracker-days", "{}").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.get("carbs-tracker-days").unwrap().as_deref(), Some("{}"));
    }
}
