// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded per-session conversation memory, persisted through the cache.
//!
//! Each session holds an ordered list of (question, sql, summary) entries,
//! newest last, capped at the history limit. The session TTL is refreshed on
//! every access. History is a convenience feature: all operations are
//! best-effort and degrade to "no history" when the backend is down.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use askdb_cache::{keys, ns, Cache};
use askdb_core::{HistoryEntry, SessionId};

/// Session bookkeeping stored beside the history list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMeta {
    pub created_at: String,
    pub last_activity: String,
    pub query_count: u64,
}

/// Aggregate view of one session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub exists: bool,
    pub entries: usize,
    pub query_count: u64,
    pub created_at: Option<String>,
    pub last_activity: Option<String>,
}

/// Conversation memory over the shared cache.
#[derive(Clone)]
pub struct ConversationMemory {
    cache: Cache,
    session_ttl: Duration,
    history_limit: usize,
}

impl ConversationMemory {
    pub fn new(cache: Cache, session_ttl: Duration, history_limit: usize) -> Self {
        Self {
            cache,
            session_ttl,
            history_limit: history_limit.max(1),
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Appends one entry, dropping the oldest entries past the limit, and
    /// refreshes the session TTL.
    pub async fn append(&self, session: &SessionId, question: &str, sql: &str, summary: &str) {
        let now = chrono::Utc::now().to_rfc3339();
        let mut entries = self.load(session).await;
        entries.push(HistoryEntry {
            question: question.to_string(),
            sql: sql.to_string(),
            summary: summary.to_string(),
            created_at: now.clone(),
        });
        while entries.len() > self.history_limit {
            entries.remove(0);
        }
        self.store(session, &entries).await;

        let mut meta = self
            .cache
            .get_json::<SessionMeta>(ns::SESSION, &meta_key(session))
            .await
            .unwrap_or(SessionMeta {
                created_at: now.clone(),
                ..SessionMeta::default()
            });
        meta.last_activity = now;
        meta.query_count += 1;
        self.cache
            .put_json(ns::SESSION, &meta_key(session), &meta, self.session_ttl)
            .await;

        debug!(session = %session, entries = entries.len(), "history appended");
    }

    /// Up to `k` entries in insertion order, newest last. Refreshes the
    /// session TTL as an access.
    pub async fn recent(&self, session: &SessionId, k: usize) -> Vec<HistoryEntry> {
        let entries = self.load(session).await;
        if !entries.is_empty() {
            // Access refreshes the TTL.
            self.store(session, &entries).await;
        }
        let skip = entries.len().saturating_sub(k);
        entries.into_iter().skip(skip).collect()
    }

    /// Digest of the trailing question/summary pairs, feeding the answer
    /// cache key.
    pub async fn history_digest(&self, session: &SessionId, n: usize) -> String {
        let entries = self.recent(session, n.min(self.history_limit)).await;
        let pairs: Vec<(&str, &str)> = entries
            .iter()
            .map(|e| (e.question.as_str(), e.summary.as_str()))
            .collect();
        keys::history_digest(&pairs)
    }

    /// Removes the session's history and bookkeeping.
    pub async fn clear(&self, session: &SessionId) {
        self.cache.invalidate(ns::SESSION, &session.0).await;
        self.cache.invalidate(ns::SESSION, &meta_key(session)).await;
    }

    pub async fn stats(&self, session: &SessionId) -> SessionStats {
        let entries = self.load(session).await;
        let meta = self
            .cache
            .get_json::<SessionMeta>(ns::SESSION, &meta_key(session))
            .await;
        SessionStats {
            exists: meta.is_some() || !entries.is_empty(),
            entries: entries.len(),
            query_count: meta.as_ref().map(|m| m.query_count).unwrap_or(0),
            created_at: meta.as_ref().map(|m| m.created_at.clone()),
            last_activity: meta.map(|m| m.last_activity),
        }
    }

    async fn load(&self, session: &SessionId) -> Vec<HistoryEntry> {
        self.cache
            .get_json::<Vec<HistoryEntry>>(ns::SESSION, &session.0)
            .await
            .unwrap_or_default()
    }

    async fn store(&self, session: &SessionId, entries: &[HistoryEntry]) {
        self.cache
            .put_json(ns::SESSION, &session.0, &entries, self.session_ttl)
            .await;
    }
}

fn meta_key(session: &SessionId) -> String {
    format!("{}#meta", session.0)
}
