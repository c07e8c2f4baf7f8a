// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message history cache with write-through persistence.
//!
//! The in-memory map is authoritative while a session is live. Every append
//! is written through to the key-value store as JSON under `context:{id}`;
//! a cache miss reads it back and repopulates. Session records go to
//! `session:{id}`. Store failures are logged and swallowed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, warn};

use handoff_core::{ConversationContext, HandoffError, KeyValueStore, Message, Session};

fn context_key(session_id: &str) -> String {
    format!("context:{session_id}")
}

fn session_key(session_id: &str) -> String {
    format!("session:{session_id}")
}

pub struct ConversationStore {
    cache: RwLock<HashMap<String, ConversationContext>>,
    kv: Option<Arc<dyn KeyValueStore>>,
    ttl: Duration,
}

impl ConversationStore {
    pub fn new(kv: Option<Arc<dyn KeyValueStore>>, ttl: Duration) -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
            kv,
            ttl,
        }
    }

    /// Starts an empty history for a new session.
    pub async fn create(&self, session_id: &str) {
        let context = ConversationContext::new(session_id);
        self.cache
            .write()
            .await
            .insert(session_id.to_string(), context.clone());
        self.write_through(&context).await;
    }

    /// Appends a message and writes the updated history through.
    pub async fn append(&self, session_id: &str, message: Message) {
        let cached = self.cache.read().await.contains_key(session_id);
        // Read the persisted copy before taking the write lock.
        let restored = if cached {
            None
        } else {
            self.fetch(session_id).await
        };

        let snapshot = {
            let mut cache = self.cache.write().await;
            let context = cache.entry(session_id.to_string()).or_insert_with(|| {
                restored.unwrap_or_else(|| ConversationContext::new(session_id))
            });
            context.push(message);
            context.clone()
        };
        self.write_through(&snapshot).await;
    }

    /// Full history, reading through to the store on a cache miss.
    pub async fn get(&self, session_id: &str) -> Option<ConversationContext> {
        if let Some(context) = self.cache.read().await.get(session_id) {
            return Some(context.clone());
        }
        let restored = self.fetch(session_id).await?;
        debug!(session_id, "conversation restored from store");
        self.cache
            .write()
            .await
            .entry(session_id.to_string())
            .or_insert_with(|| restored.clone());
        Some(restored)
    }

    /// The last `n` messages, oldest first.
    pub async fn recent(&self, session_id: &str, n: usize) -> Vec<Message> {
        self.get(session_id)
            .await
            .map(|context| context.recent(n).to_vec())
            .unwrap_or_default()
    }

    /// Drops the cached history. The persisted copy expires on its own.
    pub async fn evict(&self, session_id: &str) -> bool {
        self.cache.write().await.remove(session_id).is_some()
    }

    /// Drops expired entries from the backing store. Returns how many went.
    pub async fn purge_expired(&self) -> usize {
        let Some(kv) = &self.kv else {
            return 0;
        };
        match kv.purge_expired().await {
            Ok(removed) => {
                if removed > 0 {
                    debug!(removed, "expired conversation entries purged");
                }
                removed
            }
            Err(e) => {
                warn!(error = %e, "failed to purge expired entries (non-fatal)");
                0
            }
        }
    }

    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn persist_session(&self, session: &Session) {
        let Some(kv) = &self.kv else {
            return;
        };
        let result = match serde_json::to_vec(session) {
            Ok(bytes) => kv.set_with_expiry(&session_key(&session.id), bytes, self.ttl).await,
            Err(e) => Err(HandoffError::persistence(e)),
        };
        if let Err(e) = result {
            warn!(session_id = %session.id, error = %e, "failed to persist session (non-fatal)");
        }
    }

    pub async fn load_session(&self, session_id: &str) -> Option<Session> {
        let kv = self.kv.as_ref()?;
        match kv.get(&session_key(session_id)).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(session) => Some(session),
                Err(e) => {
                    warn!(session_id, error = %e, "stored session is unreadable (non-fatal)");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(session_id, error = %e, "failed to load session (non-fatal)");
                None
            }
        }
    }

    async fn fetch(&self, session_id: &str) -> Option<ConversationContext> {
        let kv = self.kv.as_ref()?;
        match kv.get(&context_key(session_id)).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(context) => Some(context),
                Err(e) => {
                    warn!(session_id, error = %e, "stored conversation is unreadable (non-fatal)");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(session_id, error = %e, "failed to load conversation (non-fatal)");
                None
            }
        }
    }

    async fn write_through(&self, context: &ConversationContext) {
        let Some(kv) = &self.kv else {
            return;
        };
        let result = match serde_json::to_vec(context) {
            Ok(bytes) => {
                kv.set_with_expiry(&context_key(&context.session_id), bytes, self.ttl)
                    .await
            }
            Err(e) => Err(HandoffError::persistence(e)),
        };
        if let Err(e) = result {
            warn!(
                session_id = %context.session_id,
                error = %e,
                "failed to persist conversation (non-fatal)"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as Map;

    use async_trait::async_trait;
    use handoff_core::MessageRole;
    use handoff_storage::MemoryKvStore;
    use handoff_test_utils::FailingKvStore;
    use tokio::sync::Notify;

    /// Store whose reads park until released.
    #[derive(Default)]
    struct StalledKvStore {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl KeyValueStore for StalledKvStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, HandoffError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(None)
        }

        async fn set_with_expiry(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Duration,
        ) -> Result<(), HandoffError> {
            Ok(())
        }
    }

    fn message(text: &str) -> Message {
        Message::new(MessageRole::Inbound, text).unwrap()
    }

    #[tokio::test]
    async fn append_writes_through_and_miss_fetches_back() {
        let kv = Arc::new(MemoryKvStore::new());
        let store = ConversationStore::new(Some(kv.clone()), Duration::from_secs(60));
        store.create("s1").await;
        store.append("s1", message("one")).await;
        store.append("s1", message("two")).await;

        assert!(store.evict("s1").await);
        assert_eq!(store.cached_len().await, 0);

        let restored = store.get("s1").await.unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.messages[1].content, "two");
        assert_eq!(store.cached_len().await, 1);
    }

    #[tokio::test]
    async fn recent_returns_window_oldest_first() {
        let store = ConversationStore::new(None, Duration::from_secs(60));
        store.create("s1").await;
        for i in 0..5 {
            store.append("s1", message(&format!("m{i}"))).await;
        }
        let recent = store.recent("s1", 2).await;
        let texts: Vec<_> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(texts, ["m3", "m4"]);
        assert!(store.recent("missing", 2).await.is_empty());
    }

    #[tokio::test]
    async fn store_failures_are_swallowed() {
        let store = ConversationStore::new(
            Some(Arc::new(FailingKvStore::new())),
            Duration::from_secs(60),
        );
        store.create("s1").await;
        store.append("s1", message("still recorded")).await;
        assert_eq!(store.get("s1").await.unwrap().len(), 1);
        assert!(store.get("other").await.is_none());

        let session = Session::new(None, "support", Map::new());
        store.persist_session(&session).await;
        assert!(store.load_session(&session.id).await.is_none());
    }

    #[tokio::test]
    async fn session_records_round_trip() {
        let store =
            ConversationStore::new(Some(Arc::new(MemoryKvStore::new())), Duration::from_secs(60));
        let session = Session::new(Some("cust".into()), "support", Map::new());
        store.persist_session(&session).await;
        assert_eq!(store.load_session(&session.id).await.unwrap(), session);
    }

    #[tokio::test]
    async fn slow_fetch_does_not_block_other_sessions() {
        let kv = Arc::new(StalledKvStore::default());
        let store = Arc::new(ConversationStore::new(
            Some(kv.clone()),
            Duration::from_secs(60),
        ));
        store.create("cached").await;

        let appending = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.append("uncached", message("hello")).await })
        };
        kv.entered.notified().await;

        let other = tokio::time::timeout(Duration::from_secs(1), store.get("cached"))
            .await
            .expect("history of another session stays readable during a fetch");
        assert!(other.is_some());

        kv.release.notify_one();
        appending.await.unwrap();
        assert_eq!(store.get("uncached").await.unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_expired_entries() {
        let kv = Arc::new(MemoryKvStore::new());
        let store = ConversationStore::new(Some(kv.clone()), Duration::from_secs(60));
        store.create("s1").await;
        store.create("s2").await;
        store.evict("s1").await;
        assert_eq!(kv.len(), 2);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(store.purge_expired().await, 0);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(store.purge_expired().await, 2);
        assert!(kv.is_empty());

        let unbacked = ConversationStore::new(None, Duration::from_secs(60));
        assert_eq!(unbacked.purge_expired().await, 0);
    }
}
