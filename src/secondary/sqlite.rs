//! SQLite backend
//!
//! One table of overflow records, keyed by logical key:
//! ```text
//! fallback_records(key TEXT PRIMARY KEY, value TEXT, stored_at INTEGER, source TEXT)
//! ```

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

use super::SecondaryBackend;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS fallback_records (
    key       TEXT PRIMARY KEY,
    value     TEXT NOT NULL,
    stored_at INTEGER NOT NULL,
    source    TEXT NOT NULL DEFAULT 'fallback'
);
";

/// Overflow records in a SQLite database
pub struct SqliteBackend {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteBackend {
    /// Open or create the database at `path`
    ///
    /// Missing parent directories are created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        let _: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
        conn.execute_batch(SCHEMA_SQL)?;

        tracing::debug!(path = %path.display(), "secondary database opened");
        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// A private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn, path: None })
    }

    /// Database path (None for in-memory)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl SecondaryBackend for SqliteBackend {
    fn put(&mut self, key: &str, value: &str, stored_at: u64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO fallback_records (key, value, stored_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, stored_at = excluded.stored_at",
            params![key, value, stored_at as i64],
        )?;
        Ok(())
    }

    fn get(&mut self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM fallback_records WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn delete(&mut self, key: &str) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM fallback_records WHERE key = ?1", params![key])?;
        Ok(changed > 0)
    }

    fn clear(&mut self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM fallback_records", [])?)
    }

    fn keys(&mut self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM fallback_records ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(keys)
    }
}
