// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A key-value store that is always down.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use handoff_core::{HandoffError, KeyValueStore};

/// Fails every `get` and `set_with_expiry`, counting the attempts.
#[derive(Debug, Default)]
pub struct FailingKvStore {
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl FailingKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_attempts(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn set_attempts(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyValueStore for FailingKvStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, HandoffError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Err(HandoffError::persistence("connection refused"))
    }

    async fn set_with_expiry(
        &self,
        _key: &str,
        _value: Vec<u8>,
        _ttl: Duration,
    ) -> Result<(), HandoffError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        Err(HandoffError::persistence("connection refused"))
    }
}
