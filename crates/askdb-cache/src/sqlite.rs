// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite cache backend.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Expiry is lazy: reads filter on `expires_at`, and the scheduler's
//! sweep deletes dead rows. Capacity pressure evicts the oldest live rows
//! first.

use std::time::Duration;

use async_trait::async_trait;
use rusqlite::params;
use tracing::debug;

use askdb_core::{AskdbError, CacheStore};

/// SQLite-backed `CacheStore`.
#[derive(Clone)]
pub struct SqliteCache {
    conn: tokio_rusqlite::Connection,
    capacity: u64,
}

impl SqliteCache {
    /// Opens (or creates) the cache database at `path` and applies pragmas
    /// and schema.
    pub async fn open(path: &str, capacity: u64) -> Result<Self, AskdbError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(map_cache_err)?;

        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;
                 CREATE TABLE IF NOT EXISTS cache_entries (
                     namespace  TEXT NOT NULL,
                     key        TEXT NOT NULL,
                     value      BLOB NOT NULL,
                     created_at INTEGER NOT NULL,
                     expires_at INTEGER NOT NULL,
                     PRIMARY KEY (namespace, key)
                 );
                 CREATE INDEX IF NOT EXISTS idx_cache_expires
                     ON cache_entries (expires_at);",
            )?;
            Ok(())
        })
        .await
        .map_err(map_cache_err)?;

        Ok(Self { conn, capacity })
    }

    /// Opens an in-memory cache. Used by tests and by deployments that do
    /// not need cross-process sharing.
    pub async fn open_in_memory(capacity: u64) -> Result<Self, AskdbError> {
        // ":memory:" gives each open its own database, which is what the
        // single background connection needs.
        Self::open(":memory:", capacity).await
    }

    pub async fn close(&self) -> Result<(), AskdbError> {
        self.conn.clone().close().await.map_err(map_cache_err)
    }

    /// Number of live (unexpired) entries.
    pub async fn live_len(&self) -> Result<u64, AskdbError> {
        let now = now_millis();
        self.conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM cache_entries WHERE expires_at > ?1",
                    params![now],
                    |row| row.get(0),
                )?;
                Ok(count as u64)
            })
            .await
            .map_err(map_cache_err)
    }
}

#[async_trait]
impl CacheStore for SqliteCache {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>, AskdbError> {
        let namespace = namespace.to_string();
        let key = key.to_string();
        let now = now_millis();
        self.conn
            .call(move |conn| {
                let result = conn.query_row(
                    "SELECT value FROM cache_entries
                     WHERE namespace = ?1 AND key = ?2 AND expires_at > ?3",
                    params![namespace, key, now],
                    |row| row.get::<_, Vec<u8>>(0),
                );
                match result {
                    Ok(value) => Ok(Some(value)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(map_cache_err)
    }

    async fn put(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<(), AskdbError> {
        let namespace = namespace.to_string();
        let key = key.to_string();
        let value = value.to_vec();
        let now = now_millis();
        let expires_at = now + ttl.as_millis() as i64;
        let capacity = self.capacity;
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR REPLACE INTO cache_entries
                         (namespace, key, value, created_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![namespace, key, value, now, expires_at],
                )?;

                // Evict oldest rows past the capacity cap.
                let count: i64 =
                    tx.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
                if count as u64 > capacity {
                    let excess = count as u64 - capacity;
                    tx.execute(
                        "DELETE FROM cache_entries WHERE rowid IN (
                             SELECT rowid FROM cache_entries
                             ORDER BY created_at ASC LIMIT ?1
                         )",
                        params![excess as i64],
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(map_cache_err)
    }

    async fn put_if_absent(
        &self,
        namespace: &str,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, AskdbError> {
        let namespace = namespace.to_string();
        let key = key.to_string();
        let value = value.to_vec();
        let now = now_millis();
        let expires_at = now + ttl.as_millis() as i64;
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                // A dead entry must not block acquisition.
                tx.execute(
                    "DELETE FROM cache_entries
                     WHERE namespace = ?1 AND key = ?2 AND expires_at <= ?3",
                    params![namespace, key, now],
                )?;
                let inserted = tx.execute(
                    "INSERT OR IGNORE INTO cache_entries
                         (namespace, key, value, created_at, expires_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![namespace, key, value, now, expires_at],
                )?;
                tx.commit()?;
                Ok(inserted > 0)
            })
            .await
            .map_err(map_cache_err)
    }

    async fn invalidate(&self, namespace: &str, key: &str) -> Result<(), AskdbError> {
        let namespace = namespace.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM cache_entries WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key],
                )?;
                Ok(())
            })
            .await
            .map_err(map_cache_err)
    }

    async fn purge_expired(&self) -> Result<u64, AskdbError> {
        let now = now_millis();
        let purged = self
            .conn
            .call(move |conn| {
                let purged = conn.execute(
                    "DELETE FROM cache_entries WHERE expires_at <= ?1",
                    params![now],
                )?;
                Ok(purged as u64)
            })
            .await
            .map_err(map_cache_err)?;
        if purged > 0 {
            debug!(purged, "purged expired cache entries");
        }
        Ok(purged)
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn map_cache_err(e: tokio_rusqlite::Error) -> AskdbError {
    AskdbError::Cache {
        source: Box::new(e),
    }
}
