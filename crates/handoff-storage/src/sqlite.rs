// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed key-value store.
//!
//! Rows carry an absolute `expires_at` (Unix milliseconds); reads ignore
//! expired rows and `purge_expired` deletes them.
//! All statements run on tokio-rusqlite's background thread.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_rusqlite::Connection;
use tracing::debug;

use handoff_core::{HandoffError, KeyValueStore};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv_entries (
    key TEXT PRIMARY KEY NOT NULL,
    value BLOB NOT NULL,
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_kv_entries_expires_at ON kv_entries (expires_at);";

fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> HandoffError {
    HandoffError::persistence(e)
}

/// [`KeyValueStore`] persisted in a single SQLite table.
pub struct SqliteKvStore {
    conn: Connection,
}

impl SqliteKvStore {
    /// Opens (or creates) the database at `path` and ensures the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, HandoffError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(HandoffError::persistence)?;
        }
        let conn = Connection::open(path)
            .await
            .map_err(HandoffError::persistence)?;
        let store = Self { conn };
        store.init(true).await?;
        debug!(path = %path.display(), "SQLite key-value store opened");
        Ok(store)
    }

    /// Opens a private in-memory database.
    pub async fn open_in_memory() -> Result<Self, HandoffError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(HandoffError::persistence)?;
        let store = Self { conn };
        store.init(false).await?;
        Ok(store)
    }

    async fn init(&self, wal: bool) -> Result<(), HandoffError> {
        self.conn
            .call(move |conn| {
                if wal {
                    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                        row.get::<_, String>(0)
                    })?;
                }
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, HandoffError> {
        let key = key.to_string();
        let now = Utc::now().timestamp_millis();
        self.conn
            .call(move |conn| {
                let result = conn.query_row(
                    "SELECT value FROM kv_entries WHERE key = ?1 AND expires_at > ?2",
                    rusqlite::params![key, now],
                    |row| row.get::<_, Vec<u8>>(0),
                );
                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e),
                }
            })
            .await
            .map_err(map_tr_err)
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), HandoffError> {
        let key = key.to_string();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_ms);
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT OR REPLACE INTO kv_entries (key, value, expires_at) VALUES (?1, ?2, ?3)",
                    rusqlite::params![key, value, expires_at],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn purge_expired(&self) -> Result<usize, HandoffError> {
        let now = Utc::now().timestamp_millis();
        let removed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "DELETE FROM kv_entries WHERE expires_at <= ?1",
                    rusqlite::params![now],
                )?;
                Ok(n)
            })
            .await
            .map_err(map_tr_err)?;
        debug!(removed, "purged expired key-value rows");
        Ok(removed)
    }
}
