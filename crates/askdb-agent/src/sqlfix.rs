// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cheap local SQL hygiene applied to LM output.
//!
//! These run between correction attempts at zero cost and never count
//! against the correction budget: fence stripping, emptiness detection,
//! the read-only verb filter, and the known-table check. The statement text
//! itself is otherwise preserved byte-for-byte; result bounding is a prompt
//! instruction, not a rewrite.

use askdb_lm::parse::strip_code_fences;

/// Verbs rejected by the read-only filter when they lead a statement.
const WRITE_VERBS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "create", "truncate", "grant", "revoke",
    "replace", "attach", "vacuum", "pragma",
];

/// Strips markdown fences and surrounding whitespace.
pub fn clean_statement(raw: &str) -> String {
    strip_code_fences(raw)
}

/// Returns the offending verb when a statement would write in a read-only
/// deployment. Only the leading verb is checked; the connector is the
/// backstop for anything sneakier.
pub fn forbidden_verb(sql: &str) -> Option<&'static str> {
    let first = sql.split_whitespace().next()?.to_lowercase();
    WRITE_VERBS.iter().find(|v| **v == first).copied()
}

/// True for statements that reference at least one known table.
///
/// Generated SQL naming no known table cannot possibly execute; failing
/// before the connector gives a clearer error than "no such table".
pub fn references_known_table(sql: &str, tables: &[String]) -> bool {
    let lower = sql.to_lowercase();
    tables.iter().any(|t| lower.contains(&t.to_lowercase()))
}
