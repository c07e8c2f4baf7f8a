// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value persistence backends for the Handoff coordinator.
//!
//! The coordinator writes conversation history and session records through
//! a [`KeyValueStore`]; this crate provides an in-memory store and a SQLite
//! store, selected by `[persistence] backend`.

pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use handoff_config::{PersistenceBackend, PersistenceConfig};
use handoff_core::{HandoffError, KeyValueStore};
use tracing::info;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

/// Opens the configured backend. `backend = "none"` yields `None`.
pub async fn open_backend(
    config: &PersistenceConfig,
) -> Result<Option<Arc<dyn KeyValueStore>>, HandoffError> {
    let store: Option<Arc<dyn KeyValueStore>> = match config.backend {
        PersistenceBackend::Memory => Some(Arc::new(MemoryKvStore::new())),
        PersistenceBackend::Sqlite => {
            Some(Arc::new(SqliteKvStore::open(&config.database_path).await?))
        }
        PersistenceBackend::None => None,
    };
    info!(backend = ?config.backend, ttl_secs = config.ttl_secs, "persistence backend ready");
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn none_backend_has_no_store() {
        let config = PersistenceConfig {
            backend: PersistenceBackend::None,
            ..Default::default()
        };
        assert!(open_backend(&config).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_backend_opens_configured_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handoff.db");
        let config = PersistenceConfig {
            backend: PersistenceBackend::Sqlite,
            ttl_secs: 60,
            database_path: path.display().to_string(),
        };
        let store = open_backend(&config).await.unwrap().unwrap();
        store
            .set_with_expiry("session:x", b"{}".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(path.exists());
        assert_eq!(store.get("session:x").await.unwrap(), Some(b"{}".to_vec()));
    }
}
