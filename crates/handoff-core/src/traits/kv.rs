// SPDX-FileCopyrightText: 2026 Handoff Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-value persistence contract.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::HandoffError;

/// Minimal get / set-with-expiry store used for write-through persistence.
///
/// Durability is best effort: callers log and swallow failures.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns the stored bytes, or `None` when missing or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, HandoffError>;

    /// Stores `value` under `key`, replacing any previous value, for `ttl`.
    async fn set_with_expiry(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> Result<(), HandoffError>;

    /// Deletes every expired entry and returns how many were removed.
    ///
    /// Stores that expire entries on their own keep the default no-op.
    async fn purge_expired(&self) -> Result<usize, HandoffError> {
        Ok(0)
    }
}
