// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Askdb query-processing engine.
//!
//! This crate provides the foundational error types, shared domain types,
//! and the three boundary traits (language model, SQL connector, cache
//! store) that the rest of the workspace implements and composes.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{AgentFailure, AskdbError, ConnectorError, ErrorKind};
pub use traits::{CacheStore, LmProvider, SqlConnector};
pub use types::{
    AnswerPayload, ColumnInfo, CompletionRequest, HistoryEntry, JobId, ResultRecord, Scalar,
    SessionId, TableData,
};
