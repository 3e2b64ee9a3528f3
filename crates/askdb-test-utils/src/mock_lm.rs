// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock language-model provider and transport for deterministic testing.
//!
//! Replies are popped from a FIFO queue. When the queue is empty, a default
//! "mock response" text is returned. The same script type backs both the
//! cooked [`LmProvider`] boundary (for pipeline tests) and the raw
//! [`ChatTransport`] boundary (for exercising the client's breaker, retry,
//! and cache layers).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use askdb_core::{AskdbError, CompletionRequest, LmProvider};
use askdb_lm::{ChatTransport, TransportError, TransportErrorKind};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Return this text.
    Text(String),
    /// Sleep, then return this text. Drives timeout scenarios.
    Slow(Duration, String),
    /// Fail with a transient upstream error (network/5xx class).
    Unavailable,
    /// Fail with a terminal client error (4xx class).
    Rejected,
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }
}

/// A scripted LM that answers from a FIFO queue and counts calls.
pub struct MockLm {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    calls: AtomicU32,
}

impl MockLm {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_replies(replies: Vec<Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            calls: AtomicU32::new(0),
        }
    }

    /// Convenience for all-text scripts.
    pub fn with_texts(texts: Vec<&str>) -> Self {
        Self::with_replies(texts.into_iter().map(Reply::text).collect())
    }

    pub async fn push(&self, reply: Reply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Total calls that reached this mock.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    async fn next_reply(&self) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Reply::text("mock response"))
    }
}

impl Default for MockLm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LmProvider for MockLm {
    async fn complete(&self, _request: &CompletionRequest) -> Result<String, AskdbError> {
        match self.next_reply().await {
            Reply::Text(text) => Ok(text),
            Reply::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Reply::Unavailable => Err(AskdbError::Provider {
                message: "mock upstream unavailable".into(),
                source: None,
            }),
            Reply::Rejected => Err(AskdbError::Provider {
                message: "mock request rejected".into(),
                source: None,
            }),
        }
    }
}

#[async_trait]
impl ChatTransport for MockLm {
    async fn send(
        &self,
        _request: &CompletionRequest,
        _model: &str,
    ) -> Result<String, TransportError> {
        match self.next_reply().await {
            Reply::Text(text) => Ok(text),
            Reply::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Reply::Unavailable => Err(TransportError::new(
                TransportErrorKind::Http(503),
                "mock upstream unavailable",
            )),
            Reply::Rejected => Err(TransportError::new(
                TransportErrorKind::Http(400),
                "mock request rejected",
            )),
        }
    }
}
