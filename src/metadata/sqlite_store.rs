//! SQLite implementation of KeyValueStore

use async_trait::async_trait;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::metadata::config::MetadataConfig;
use crate::metadata::KeyValueStore;

const BACKEND: &str = "sqlite";

/// SQLite implementation of KeyValueStore
pub struct SQLiteKeyValueStore {
    conn: Arc<Mutex<Connection>>,
}

impl SQLiteKeyValueStore {
    /// Open (or create) the database named by `config.db_path`
    pub fn new(config: &MetadataConfig) -> Result<Self> {
        let db_path = Path::new(&config.db_path);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("failed to create metadata directory {}: {}", parent.display(), e))
                })?;
            }
        }
        info!("Using SQLite metadata database: {}", db_path.display());
        let conn = Connection::open(db_path).map_err(|e| Error::Config(format!("failed to open database: {}", e)))?;
        Self::from_connection(conn, config.wal_mode)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Config(e.to_string()))?;
        Self::from_connection(conn, false)
    }

    fn from_connection(conn: Connection, wal_mode: bool) -> Result<Self> {
        if wal_mode {
            if let Err(e) = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get::<_, String>(0)) {
                warn!("Could not enable WAL mode: {}", e);
            }
        }
        conn.execute(
            "CREATE TABLE IF NOT EXISTS photo_metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| Error::Config(format!("failed to create table: {}", e)))?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    fn db_error(operation: &str, e: rusqlite::Error) -> Error {
        Error::backend(BACKEND, operation, e)
    }

    fn conn(&self, operation: &str) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::backend(BACKEND, operation, "connection lock poisoned"))
    }
}

#[async_trait]
impl KeyValueStore for SQLiteKeyValueStore {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn("get")?;
        conn.query_row(
            "SELECT value FROM photo_metadata WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        )
        .optional()
        .map_err(|e| Self::db_error("get", e))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn("set")?;
        conn.execute(
            "INSERT INTO photo_metadata (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(|e| Self::db_error("set", e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let conn = self.conn("delete")?;
        let removed = conn
            .execute("DELETE FROM photo_metadata WHERE key = ?1", params![key])
            .map_err(|e| Self::db_error("delete", e))?;
        Ok(removed > 0)
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn("keys")?;
        let mut stmt = conn
            .prepare("SELECT key FROM photo_metadata WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key")
            .map_err(|e| Self::db_error("keys", e))?;

        let rows = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))
            .map_err(|e| Self::db_error("keys", e))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row.map_err(|e| Self::db_error("keys", e))?);
        }
        Ok(keys)
    }

    async fn ping(&self) -> Result<()> {
        let conn = self.conn("ping")?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| Self::db_error("ping", e))
    }
}
