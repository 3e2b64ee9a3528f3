// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Askdb query-processing core.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

/// The primary error type used across all Askdb components.
#[derive(Debug, Error)]
pub enum AskdbError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Cache backend errors (connection, query failure, serialization).
    #[error("cache error: {source}")]
    Cache {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Database connector errors.
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// Language-model provider errors (HTTP failure, bad response, parse failure).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The LM circuit breaker is open; no outbound call was made.
    #[error("language model unavailable: circuit open")]
    CircuitOpen,

    /// Operation exceeded its deadline.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AskdbError {
    /// True for failures worth retrying at the dispatcher level.
    pub fn is_transient(&self) -> bool {
        match self {
            AskdbError::Connector(e) => e.is_transient(),
            AskdbError::CircuitOpen => true,
            _ => false,
        }
    }
}

/// Errors surfaced by the SQL connector boundary.
///
/// `Connection` and `Timeout` are transient; the rest are terminal for the
/// statement that produced them.
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("statement timed out")]
    Timeout,

    #[error("SQL syntax error: {0}")]
    Syntax(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("{0}")]
    Other(String),
}

impl ConnectorError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ConnectorError::Connection(_) | ConnectorError::Timeout)
    }
}

/// The machine-readable failure taxonomy surfaced at the polling boundary.
///
/// The serialized forms are the wire contract and keep the upstream
/// capitalization (`SQLSynthesisFailed`, `LMUnavailable`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum ErrorKind {
    /// Malformed or empty question.
    InvalidInput,
    /// Dispatcher queue full; caller should back off.
    Overloaded,
    /// Poll on an id that has expired or never existed.
    UnknownJob,
    /// Table selection returned no known tables.
    NoRelevantTables,
    /// The LM produced no parseable SQL within the retry budget.
    #[serde(rename = "SQLSynthesisFailed")]
    #[strum(serialize = "SQLSynthesisFailed")]
    SqlSynthesisFailed,
    /// The correction graph exhausted its attempts.
    #[serde(rename = "SQLExecutionFailed")]
    #[strum(serialize = "SQLExecutionFailed")]
    SqlExecutionFailed,
    /// Circuit breaker open or persistent upstream failure.
    #[serde(rename = "LMUnavailable")]
    #[strum(serialize = "LMUnavailable")]
    LmUnavailable,
    /// Soft-limit final or hard-limit abandonment.
    Timeout,
    /// Anything else; the message stays generic and details are logged.
    InternalError,
}

impl ErrorKind {
    /// A short human sentence shown to the end user for this kind.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::InvalidInput => "The question is empty or too long.",
            ErrorKind::Overloaded => "The system is busy right now. Please try again shortly.",
            ErrorKind::UnknownJob => "That request has expired or never existed.",
            ErrorKind::NoRelevantTables => "I'm not sure which data this refers to.",
            ErrorKind::SqlSynthesisFailed => "I couldn't turn that question into a query.",
            ErrorKind::SqlExecutionFailed => {
                "I'm having trouble answering that. Could you rephrase it?"
            }
            ErrorKind::LmUnavailable => "The language model is unavailable right now.",
            ErrorKind::Timeout => "That question took too long to answer.",
            ErrorKind::InternalError => "Something went wrong while answering that.",
        }
    }

}

/// A terminal pipeline failure: a machine-readable kind, a user-presentable
/// message, and the last SQL attempted (if any) for operator debugging.
///
/// `retryable` drives the dispatcher's re-enqueue policy: a fail-fast on an
/// OPEN circuit is terminal, while a half-open probe failure or a transient
/// connector error may be retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFailure {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default)]
    pub retryable: bool,
}

impl AgentFailure {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.user_message().to_string(),
            sql: None,
            retryable: false,
        }
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// Classifies an infrastructure error into a boundary failure.
    pub fn from_error(err: &AskdbError) -> Self {
        match err {
            // The circuit is open: failing fast is the point, re-enqueueing
            // would only thrash the queue until the cooldown elapses.
            AskdbError::CircuitOpen => AgentFailure::new(ErrorKind::LmUnavailable),
            AskdbError::Provider { .. } => AgentFailure::new(ErrorKind::LmUnavailable).retryable(),
            AskdbError::Timeout { .. } => AgentFailure::new(ErrorKind::Timeout),
            AskdbError::Connector(e) if e.is_transient() => {
                AgentFailure::new(ErrorKind::InternalError).retryable()
            }
            AskdbError::Connector(_) => AgentFailure::new(ErrorKind::SqlExecutionFailed),
            _ => AgentFailure::new(ErrorKind::InternalError),
        }
    }
}
