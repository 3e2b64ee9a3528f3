// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `CacheStore` for tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use askdb_core::{AskdbError, CacheStore};

type Key = (String, String);

/// HashMap-backed cache with real TTL semantics. Cooperates with paused
/// tokio clocks.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<Key, (Vec<u8>, Instant)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, AskdbError> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .filter(|(_, expires)| *expires > Instant::now())
            .map(|(value, _)| value.clone()))
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), AskdbError> {
        self.entries.lock().await.insert(
            (namespace.to_string(), key.to_string()),
            (value.to_vec(), Instant::now() + ttl),
        );
        Ok(())
    }

    async fn put_if_absent(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, AskdbError> {
        let mut entries = self.entries.lock().await;
        let k = (namespace.to_string(), key.to_string());
        let live = entries
            .get(&k)
            .map(|(_, expires)| *expires > Instant::now())
            .unwrap_or(false);
        if live {
            return Ok(false);
        }
        entries.insert(k, (value.to_vec(), Instant::now() + ttl));
        Ok(true)
    }

    async fn invalidate(&self, namespace: &str, key: &str) -> Result<(), AskdbError> {
        self.entries
            .lock()
            .await
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, AskdbError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, (_, expires)| *expires > now);
        Ok((before - entries.len()) as u64)
    }
}
