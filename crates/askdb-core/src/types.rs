// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the Askdb workspace.

use serde::{Deserialize, Serialize};

use crate::error::{AgentFailure, ErrorKind};

/// Unique identifier for a submitted question job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-supplied identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single cell value in a tabular result.
///
/// Connectors return rows opaquely; the core only distinguishes enough to
/// serialize faithfully and to infer column types for visualization hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Scalar::Int(_) | Scalar::Float(_))
    }
}

/// An ordered tabular result: column names plus rows of scalars.
///
/// Invariant: every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TableData {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Scalar>>,
}

impl TableData {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when every row's width matches the column list.
    pub fn is_rectangular(&self) -> bool {
        self.rows.iter().all(|r| r.len() == self.columns.len())
    }
}

/// Column metadata from the connector's `describe_table`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub sql_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// The complete product of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerPayload {
    /// The SQL that produced the table (post-correction if one was applied).
    pub sql: String,
    /// Natural-language summary of the result.
    pub summary: String,
    /// Ordered tabular result.
    pub table: TableData,
    /// Up to five suggested follow-up questions.
    pub suggestions: Vec<String>,
    /// Whether the correction graph rewrote the generated SQL.
    pub correction_applied: bool,
}

/// The state of a job as observed through the result store.
///
/// Once a record is terminal it is immutable; its TTL is counted from the
/// terminal write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ResultRecord {
    /// Enqueued, not yet picked up by a worker.
    #[serde(rename = "queued")]
    Pending,
    /// Owned by a worker since `started_at` (RFC 3339).
    Running { started_at: String },
    Succeeded { payload: AnswerPayload },
    Failed { error: AgentFailure },
    Cancelled,
}

impl ResultRecord {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ResultRecord::Succeeded { .. } | ResultRecord::Failed { .. } | ResultRecord::Cancelled
        )
    }

    pub fn failed(kind: ErrorKind) -> Self {
        ResultRecord::Failed {
            error: AgentFailure::new(kind),
        }
    }
}

/// One entry in a session's conversation history, newest entries last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub question: String,
    pub sql: String,
    pub summary: String,
    /// RFC 3339 append timestamp.
    pub created_at: String,
}

/// A single chat-completion request as the core hands it to an LM provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    pub user_prompt: String,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(user_prompt: impl Into<String>, temperature: f32) -> Self {
        Self {
            system_prompt: None,
            user_prompt: user_prompt.into(),
            temperature,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_prompt = Some(system.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rectangularity() {
        let table = TableData {
            columns: vec!["a".into(), "b".into()],
            rows: vec![
                vec![Scalar::Int(1), Scalar::Text("x".into())],
                vec![Scalar::Null, Scalar::Float(2.5)],
            ],
        };
        assert!(table.is_rectangular());
        assert_eq!(table.row_count(), 2);

        let ragged = TableData {
            columns: vec!["a".into()],
            rows: vec![vec![Scalar::Int(1), Scalar::Int(2)]],
        };
        assert!(!ragged.is_rectangular());
    }

    #[test]
    fn result_record_state_tags() {
        let json = serde_json::to_value(&ResultRecord::Pending).unwrap();
        assert_eq!(json["state"], "queued");

        let json = serde_json::to_value(&ResultRecord::Cancelled).unwrap();
        assert_eq!(json["state"], "cancelled");

        let json = serde_json::to_value(&ResultRecord::Running {
            started_at: "2026-01-01T00:00:00Z".into(),
        })
        .unwrap();
        assert_eq!(json["state"], "running");
    }

    #[test]
    fn terminal_states() {
        assert!(!ResultRecord::Pending.is_terminal());
        assert!(!ResultRecord::Running {
            started_at: String::new()
        }
        .is_terminal());
        assert!(ResultRecord::Cancelled.is_terminal());
        assert!(ResultRecord::failed(ErrorKind::Timeout).is_terminal());
    }

    #[test]
    fn scalar_serialization_is_untagged() {
        assert_eq!(serde_json::to_string(&Scalar::Int(3)).unwrap(), "3");
        assert_eq!(serde_json::to_string(&Scalar::Null).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&Scalar::Text("hi".into())).unwrap(),
            "\"hi\""
        );
    }

    #[test]
    fn result_record_round_trip() {
        let record = ResultRecord::Succeeded {
            payload: AnswerPayload {
                sql: "SELECT 1".into(),
                summary: "one".into(),
                table: TableData {
                    columns: vec!["n".into()],
                    rows: vec![vec![Scalar::Int(1)]],
                },
                suggestions: vec!["And two?".into()],
                correction_applied: false,
            },
        };
        let bytes = serde_json::to_vec(&record).unwrap();
        let back: ResultRecord = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(record, back);
    }
}
