// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyed, TTL'd blob store trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AskdbError;

/// Backend for the layered cache.
///
/// Entries are addressed as `(namespace, key)` and expire after their TTL.
/// Implementations may additionally evict under capacity pressure. Errors
/// from these methods are swallowed by the cache facade: a failing backend
/// degrades the system to all-miss, never to an outage.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetches a live entry, or `None` on miss or expiry.
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, AskdbError>;

    /// Stores an entry, replacing any previous value for the key.
    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), AskdbError>;

    /// Stores an entry only if no live entry exists. Returns true when the
    /// write took effect. Used for advisory leases.
    async fn put_if_absent(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, AskdbError>;

    /// Removes an entry if present.
    async fn invalidate(&self, namespace: &str, key: &str) -> Result<(), AskdbError>;

    /// Deletes expired rows; returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, AskdbError>;
}
