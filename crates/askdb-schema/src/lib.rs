// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lazy, cached schema catalog.
//!
//! Table lists and DDL snapshots are introspected through the connector and
//! cached under the `schema` namespace. Rendering is deterministic: the same
//! underlying schema always produces byte-equal text, because the text shows
//! up both in LM prompts and in cache keys derived from them.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use askdb_cache::{keys, ns, Cache};
use askdb_core::{AskdbError, ColumnInfo, SqlConnector};

/// Reserved cache key for the table list. `#` cannot appear in an
/// identifier, so it cannot collide with a table's DDL entry.
const TABLES_KEY: &str = "#tables";

/// Cached, refresh-on-demand view of the database schema.
#[derive(Clone)]
pub struct SchemaCatalog {
    connector: Arc<dyn SqlConnector>,
    cache: Cache,
    ttl: Duration,
}

impl SchemaCatalog {
    pub fn new(connector: Arc<dyn SqlConnector>, cache: Cache, ttl: Duration) -> Self {
        Self {
            connector,
            cache,
            ttl,
        }
    }

    /// Known table names, sorted case-insensitively.
    pub async fn tables(&self) -> Result<Vec<String>, AskdbError> {
        if let Some(cached) = self.cache.get_json::<Vec<String>>(ns::SCHEMA, TABLES_KEY).await {
            return Ok(cached);
        }

        let mut tables = self.connector.list_tables().await?;
        tables.sort_by_key(|t| t.to_lowercase());
        self.cache
            .put_json(ns::SCHEMA, TABLES_KEY, &tables, self.ttl)
            .await;
        Ok(tables)
    }

    /// The deterministic DDL snapshot for one table.
    pub async fn ddl(&self, table: &str) -> Result<String, AskdbError> {
        let key = keys::schema_key(table);
        if let Some(cached) = self.cache.get(ns::SCHEMA, &key).await {
            return Ok(String::from_utf8_lossy(&cached).into_owned());
        }

        let columns = self.connector.describe_table(table).await?;
        let ddl = render_ddl(table, &columns);
        self.cache.put(ns::SCHEMA, &key, ddl.as_bytes(), self.ttl).await;
        Ok(ddl)
    }

    /// Re-introspects every table and rewrites the cached snapshots.
    ///
    /// Idempotent: two refreshes against an unchanged database produce
    /// byte-equal snapshots. On failure the previous snapshots stay valid;
    /// the error is surfaced to the scheduler.
    pub async fn refresh(&self) -> Result<usize, AskdbError> {
        let mut tables = self.connector.list_tables().await?;
        tables.sort_by_key(|t| t.to_lowercase());

        for table in &tables {
            let columns = self.connector.describe_table(table).await?;
            let ddl = render_ddl(table, &columns);
            self.cache
                .put(ns::SCHEMA, &keys::schema_key(table), ddl.as_bytes(), self.ttl)
                .await;
            debug!(table = table.as_str(), "schema snapshot refreshed");
        }
        self.cache
            .put_json(ns::SCHEMA, TABLES_KEY, &tables, self.ttl)
            .await;

        info!(tables = tables.len(), "schema refresh complete");
        Ok(tables.len())
    }

    /// Drops the cached snapshot for one table (and the table list, which
    /// may have changed with it).
    pub async fn invalidate(&self, table: &str) {
        self.cache.invalidate(ns::SCHEMA, &keys::schema_key(table)).await;
        self.cache.invalidate(ns::SCHEMA, TABLES_KEY).await;
    }
}

/// Renders column metadata into canonical DDL-like text.
///
/// Columns appear in ordinal order; nullability is spelled explicitly; a
/// column comment becomes a trailing `-- comment`.
pub fn render_ddl(table: &str, columns: &[ColumnInfo]) -> String {
    let mut out = format!("CREATE TABLE {table} (\n");
    for (i, col) in columns.iter().enumerate() {
        let nullability = if col.nullable { "NULL" } else { "NOT NULL" };
        out.push_str(&format!("    {} {} {}", col.name, col.sql_type, nullability));
        if i + 1 < columns.len() {
            out.push(',');
        }
        if let Some(comment) = &col.comment {
            out.push_str(&format!(" -- {comment}"));
        }
        out.push('\n');
    }
    out.push_str(");");
    out
}
