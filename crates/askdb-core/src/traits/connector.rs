// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-focused SQL connector trait.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ConnectorError;
use crate::types::{ColumnInfo, TableData};

/// Boundary to the database.
///
/// The core executes parameter-free SQL and treats the returned rows
/// opaquely. Implementations must guarantee the rectangularity invariant:
/// every returned row has exactly as many cells as there are columns.
#[async_trait]
pub trait SqlConnector: Send + Sync {
    /// Executes a single statement with a per-statement timeout.
    async fn execute(&self, sql: &str, timeout: Duration) -> Result<TableData, ConnectorError>;

    /// Lists known table names.
    async fn list_tables(&self) -> Result<Vec<String>, ConnectorError>;

    /// Returns column metadata for one table, in ordinal order.
    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>, ConnectorError>;
}
