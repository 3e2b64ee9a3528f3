// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered cache for LM responses, answers, schema snapshots, sessions, and
//! job results.
//!
//! The [`Cache`] facade wraps any [`CacheStore`] backend and enforces the
//! error policy: reads are best-effort, writes are fire-and-forget, and a
//! failing backend degrades the system to all-miss rather than an outage.

pub mod keys;
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use askdb_core::CacheStore;

pub use sqlite::SqliteCache;

/// Cache namespaces. The first four hold derived blobs keyed by content
/// fingerprints; `session`, `result`, and `lock` are the persisted-state
/// namespaces of the core.
pub mod ns {
    pub const LM_RESPONSE: &str = "lm_response";
    pub const ANSWER: &str = "answer";
    pub const SCHEMA: &str = "schema";
    pub const SUGGESTION: &str = "suggestion";
    pub const SESSION: &str = "session";
    pub const RESULT: &str = "result";
    pub const LOCK: &str = "lock";
}

/// Error-swallowing facade over a cache backend.
///
/// A miss is never fatal and a backend failure reads as a miss; callers
/// never branch on cache errors.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Best-effort read. Backend errors read as misses.
    pub async fn get(&self, namespace: &str, key: &str) -> Option<Vec<u8>> {
        match self.store.get(namespace, key).await {
            Ok(Some(value)) => {
                askdb_prometheus::record_cache_hit(namespace);
                Some(value)
            }
            Ok(None) => {
                askdb_prometheus::record_cache_miss(namespace);
                None
            }
            Err(e) => {
                warn!(namespace, error = %e, "cache read failed, degrading to miss");
                askdb_prometheus::record_cache_miss(namespace);
                None
            }
        }
    }

    /// Fire-and-forget write. Backend errors are logged and dropped.
    pub async fn put(&self, namespace: &str, key: &str, value: &[u8], ttl: Duration) {
        if let Err(e) = self.store.put(namespace, key, value, ttl).await {
            warn!(namespace, error = %e, "cache write failed, discarding");
        }
    }

    /// Advisory-lease acquisition. Backend errors read as "not acquired".
    pub async fn put_if_absent(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> bool {
        match self.store.put_if_absent(namespace, key, value, ttl).await {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!(namespace, error = %e, "cache lease acquisition failed");
                false
            }
        }
    }

    pub async fn invalidate(&self, namespace: &str, key: &str) {
        if let Err(e) = self.store.invalidate(namespace, key).await {
            warn!(namespace, error = %e, "cache invalidation failed");
        }
    }

    /// Sweep expired rows; returns 0 when the backend is unavailable.
    pub async fn purge_expired(&self) -> u64 {
        match self.store.purge_expired().await {
            Ok(purged) => purged,
            Err(e) => {
                warn!(error = %e, "cache purge failed");
                0
            }
        }
    }

    /// Typed read: JSON-decodes a hit; decode failures read as misses.
    pub async fn get_json<T: DeserializeOwned>(&self, namespace: &str, key: &str) -> Option<T> {
        let bytes = self.get(namespace, key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(namespace, error = %e, "cached payload failed to decode, treating as miss");
                None
            }
        }
    }

    /// Typed write: JSON-encodes the value.
    pub async fn put_json<T: Serialize>(&self, namespace: &str, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.put(namespace, key, &bytes, ttl).await,
            Err(e) => warn!(namespace, error = %e, "failed to encode cache payload"),
        }
    }
}
