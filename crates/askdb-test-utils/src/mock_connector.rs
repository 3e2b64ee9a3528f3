// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock SQL connector with a fixed schema and scripted execution outcomes.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use askdb_core::{ColumnInfo, ConnectorError, Scalar, SqlConnector, TableData};

/// A connector whose schema is fixed at construction and whose `execute`
/// outcomes are popped from a FIFO script. Executed statements are recorded
/// for assertions.
pub struct MockConnector {
    tables: Vec<(String, Vec<ColumnInfo>)>,
    outcomes: Mutex<VecDeque<Result<TableData, ConnectorError>>>,
    executed: Mutex<Vec<String>>,
}

impl MockConnector {
    pub fn new(tables: Vec<(String, Vec<ColumnInfo>)>) -> Self {
        Self {
            tables,
            outcomes: Mutex::new(VecDeque::new()),
            executed: Mutex::new(Vec::new()),
        }
    }

    /// The `users(id int, name text, created_at timestamp)` fixture the
    /// scenario tests share.
    pub fn users_fixture() -> Self {
        Self::new(vec![(
            "users".to_string(),
            vec![
                column("id", "INTEGER", false),
                column("name", "TEXT", true),
                column("created_at", "TIMESTAMP", true),
            ],
        )])
    }

    pub async fn script_ok(&self, table: TableData) {
        self.outcomes.lock().await.push_back(Ok(table));
    }

    pub async fn script_err(&self, error: ConnectorError) {
        self.outcomes.lock().await.push_back(Err(error));
    }

    /// Statements that reached `execute`, in order.
    pub async fn executed(&self) -> Vec<String> {
        self.executed.lock().await.clone()
    }
}

/// Shorthand for a `ColumnInfo` without a comment.
pub fn column(name: &str, sql_type: &str, nullable: bool) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        sql_type: sql_type.to_string(),
        nullable,
        comment: None,
    }
}

/// A one-column, one-row count table.
pub fn count_table(n: i64) -> TableData {
    TableData {
        columns: vec!["count".to_string()],
        rows: vec![vec![Scalar::Int(n)]],
    }
}

#[async_trait]
impl SqlConnector for MockConnector {
    async fn execute(&self, sql: &str, _timeout: Duration) -> Result<TableData, ConnectorError> {
        self.executed.lock().await.push(sql.to_string());
        self.outcomes
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Err(ConnectorError::Other("unscripted execute".into())))
    }

    async fn list_tables(&self) -> Result<Vec<String>, ConnectorError> {
        Ok(self.tables.iter().map(|(name, _)| name.clone()).collect())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>, ConnectorError> {
        self.tables
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, columns)| columns.clone())
            .ok_or_else(|| ConnectorError::Other(format!("unknown table: {table}")))
    }
}
