// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the read-focused SQL connector boundary.
//!
//! The core treats the connector as a single-endpoint collaborator that
//! executes parameter-free SQL and describes tables. All statements run on
//! tokio-rusqlite's background thread; the per-statement timeout is enforced
//! from the async side.

use std::time::Duration;

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use tracing::debug;

use askdb_core::{ColumnInfo, ConnectorError, Scalar, SqlConnector, TableData};

/// SQLite-backed [`SqlConnector`].
#[derive(Clone)]
pub struct SqliteConnector {
    conn: tokio_rusqlite::Connection,
}

impl SqliteConnector {
    /// Opens the database at `path` in read-focused mode.
    pub async fn open(path: &str) -> Result<Self, ConnectorError> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| ConnectorError::Connection(e.to_string()))?;
        conn.call(|conn| {
            conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
            Ok(())
        })
        .await
        .map_err(map_call_err)?;
        Ok(Self { conn })
    }

    /// Opens a private in-memory database. Used by tests and demos.
    pub async fn open_in_memory() -> Result<Self, ConnectorError> {
        Self::open(":memory:").await
    }

    /// Runs arbitrary setup SQL (table creation, seeding). Not part of the
    /// connector boundary; exists for fixtures and demos.
    pub async fn execute_batch(&self, sql: &str) -> Result<(), ConnectorError> {
        let sql = sql.to_string();
        self.conn
            .call(move |conn| {
                conn.execute_batch(&sql)?;
                Ok(())
            })
            .await
            .map_err(map_call_err)
    }
}

#[async_trait]
impl SqlConnector for SqliteConnector {
    async fn execute(&self, sql: &str, timeout: Duration) -> Result<TableData, ConnectorError> {
        let statement = sql.to_string();
        debug!(sql = statement.as_str(), "executing statement");
        let fut = self.conn.call(move |conn| {
            let mut stmt = conn.prepare(&statement)?;
            let columns: Vec<String> = stmt
                .column_names()
                .into_iter()
                .map(|c| c.to_string())
                .collect();
            let column_count = columns.len();

            let mut rows = Vec::new();
            let mut raw = stmt.query([])?;
            while let Some(row) = raw.next()? {
                let mut cells = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    cells.push(scalar_from_value(row.get_ref(i)?));
                }
                rows.push(cells);
            }
            Ok(TableData { columns, rows })
        });

        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result.map_err(map_call_err),
            Err(_) => Err(ConnectorError::Timeout),
        }
    }

    async fn list_tables(&self) -> Result<Vec<String>, ConnectorError> {
        self.conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master
                     WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
                     ORDER BY name COLLATE NOCASE",
                )?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(map_call_err)
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<ColumnInfo>, ConnectorError> {
        if !is_safe_identifier(table) {
            return Err(ConnectorError::Other(format!(
                "invalid table name: {table}"
            )));
        }
        let table = table.to_string();
        let table_for_query = table.clone();
        let columns = self
            .conn
            .call(move |conn| {
                let mut stmt =
                    conn.prepare(&format!("PRAGMA table_info(\"{table_for_query}\")"))?;
                // table_info rows come back in ordinal (cid) order.
                let columns = stmt
                    .query_map([], |row| {
                        Ok(ColumnInfo {
                            name: row.get::<_, String>(1)?,
                            sql_type: row.get::<_, String>(2)?,
                            nullable: row.get::<_, i64>(3)? == 0,
                            comment: None,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(columns)
            })
            .await
            .map_err(map_call_err)?;

        if columns.is_empty() {
            return Err(ConnectorError::Other(format!("unknown table: {table}")));
        }
        Ok(columns)
    }
}

fn scalar_from_value(value: ValueRef<'_>) -> Scalar {
    match value {
        ValueRef::Null => Scalar::Null,
        ValueRef::Integer(i) => Scalar::Int(i),
        ValueRef::Real(f) => Scalar::Float(f),
        ValueRef::Text(t) => Scalar::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Scalar::Text(String::from_utf8_lossy(b).into_owned()),
    }
}

/// Only plain identifiers are interpolated into PRAGMA statements.
fn is_safe_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn map_call_err(e: tokio_rusqlite::Error) -> ConnectorError {
    match e {
        tokio_rusqlite::Error::Rusqlite(e) => map_sqlite_err(e),
        other => ConnectorError::Connection(other.to_string()),
    }
}

fn map_sqlite_err(e: rusqlite::Error) -> ConnectorError {
    let message = e.to_string();
    match &e {
        rusqlite::Error::SqlInputError { .. } => ConnectorError::Syntax(message),
        rusqlite::Error::SqliteFailure(inner, _) => match inner.code {
            rusqlite::ErrorCode::ReadOnly | rusqlite::ErrorCode::PermissionDenied => {
                ConnectorError::Permission(message)
            }
            rusqlite::ErrorCode::CannotOpen | rusqlite::ErrorCode::DatabaseBusy => {
                ConnectorError::Connection(message)
            }
            _ if message.contains("syntax error") || message.contains("no such") => {
                ConnectorError::Syntax(message)
            }
            _ => ConnectorError::Other(message),
        },
        _ if message.contains("syntax error") || message.contains("no such") => {
            ConnectorError::Syntax(message)
        }
        _ => ConnectorError::Other(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> SqliteConnector {
        let conn = SqliteConnector::open_in_memory().await.unwrap();
        conn.execute_batch(
            "CREATE TABLE users (
                 id INTEGER PRIMARY KEY,
                 name TEXT NOT NULL,
                 created_at TEXT
             );
             CREATE TABLE Orders (qty INTEGER, price REAL);
             INSERT INTO users (id, name, created_at) VALUES
                 (1, 'ada', '2026-01-01'),
                 (2, 'grace', '2026-01-02'),
                 (3, 'alan', NULL);",
        )
        .await
        .unwrap();
        conn
    }

    #[tokio::test]
    async fn execute_returns_rectangular_table() {
        let conn = seeded().await;
        let table = conn
            .execute("SELECT id, name FROM users ORDER BY id", Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(table.columns, vec!["id", "name"]);
        assert_eq!(table.row_count(), 3);
        assert!(table.is_rectangular());
        assert_eq!(table.rows[0][0], Scalar::Int(1));
        assert_eq!(table.rows[1][1], Scalar::Text("grace".into()));
    }

    #[tokio::test]
    async fn nulls_come_back_as_null_scalars() {
        let conn = seeded().await;
        let table = conn
            .execute(
                "SELECT created_at FROM users WHERE id = 3",
                Duration::from_secs(5),
            )
            .await
            .unwrap();
        assert_eq!(table.rows[0][0], Scalar::Null);
    }

    #[tokio::test]
    async fn syntax_error_maps_to_syntax_kind() {
        let conn = seeded().await;
        let err = conn
            .execute("SELEC wrong FROM users", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::Syntax(_)), "got {err:?}");
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn unknown_table_maps_to_syntax_kind() {
        let conn = seeded().await;
        let err = conn
            .execute("SELECT COUNT(*) FROM user", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::Syntax(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn list_tables_sorted_case_insensitively() {
        let conn = seeded().await;
        let tables = conn.list_tables().await.unwrap();
        assert_eq!(tables, vec!["Orders".to_string(), "users".to_string()]);
    }

    #[tokio::test]
    async fn describe_table_preserves_ordinal_order() {
        let conn = seeded().await;
        let columns = conn.describe_table("users").await.unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "created_at"]);
        assert!(!columns[1].nullable, "name is NOT NULL");
        assert!(columns[2].nullable, "created_at is nullable");
    }

    #[tokio::test]
    async fn describe_unknown_table_fails() {
        let conn = seeded().await;
        let err = conn.describe_table("ghosts").await.unwrap_err();
        assert!(matches!(err, ConnectorError::Other(_)));
    }

    #[tokio::test]
    async fn describe_rejects_hostile_identifier() {
        let conn = seeded().await;
        let err = conn.describe_table("users\"; DROP TABLE users").await.unwrap_err();
        assert!(matches!(err, ConnectorError::Other(_)));
    }

    #[tokio::test]
    async fn statement_timeout_is_enforced() {
        let conn = seeded().await;
        let err = conn
            .execute(
                "WITH RECURSIVE cnt(x) AS (
                     SELECT 1 UNION ALL SELECT x + 1 FROM cnt LIMIT 5000000
                 ) SELECT COUNT(*) FROM cnt",
                Duration::from_millis(5),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::Timeout));
        assert!(err.is_transient());
    }
}
