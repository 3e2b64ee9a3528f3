// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt builders for each pipeline stage.
//!
//! Prompts are plain functions of their inputs so that identical inputs
//! produce identical prompts, which is what makes temperature-0 stages
//! cacheable by content fingerprint.

use askdb_core::{HistoryEntry, TableData};

/// Renders recent history into a compact context block.
pub fn context_block(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "No previous conversation.".to_string();
    }
    let mut out = String::from("Previous conversation, oldest first:\n");
    for entry in history {
        out.push_str(&format!("Q: {}\n", entry.question));
        out.push_str(&format!("A: {}\n", truncate(&entry.summary, 200)));
    }
    out
}

pub fn table_selection(question: &str, context: &str, tables: &[String]) -> String {
    format!(
        "You are a database assistant. Given a user question and the list of \
         available tables, select the tables needed to answer it.\n\n\
         Available tables:\n{}\n\n\
         {context}\n\n\
         User question: {question}\n\n\
         Respond with a JSON array of table names, nothing else. \
         Example: [\"users\", \"orders\"]",
        tables.join("\n")
    )
}

pub fn sql_generation(
    question: &str,
    context: &str,
    ddl_bundle: &[(String, String)],
    row_limit: u32,
) -> String {
    let mut schema = String::new();
    for (_, ddl) in ddl_bundle {
        schema.push_str(ddl);
        schema.push_str("\n\n");
    }
    format!(
        "You are an expert SQL writer. Generate a single SQL statement that \
         answers the user's question against the schema below.\n\n\
         Schema:\n{schema}\
         {context}\n\n\
         Rules:\n\
         1. Return exactly one SELECT statement, no commentary, no markdown.\n\
         2. Select only the columns needed; never use SELECT *.\n\
         3. Include a LIMIT clause, defaulting to {row_limit} unless the \
            question implies another bound (\"top 5\" implies LIMIT 5).\n\
         4. Guard divisions with NULLIF(denominator, 0).\n\
         5. Use only tables and columns that appear in the schema.\n\n\
         Question to convert to SQL: {question}\n\n\
         SQL:"
    )
}

pub fn correction(
    question: &str,
    failing_sql: &str,
    error: &str,
    ddl_bundle: &[(String, String)],
) -> String {
    let mut schema = String::new();
    for (_, ddl) in ddl_bundle {
        schema.push_str(ddl);
        schema.push_str("\n\n");
    }
    format!(
        "You are an SQL debugging expert. A statement failed; produce a \
         corrected one.\n\n\
         Schema:\n{schema}\
         Original question: {question}\n\
         Failed SQL: {failing_sql}\n\
         Error: {error}\n\n\
         Rules:\n\
         1. Fix the specific error while keeping the original intent.\n\
         2. Use only tables and columns that exist in the schema; a \
            \"no such column\" error usually means a near-miss name.\n\
         3. Return only the corrected SQL, no markdown, no explanation.\n\
         4. Keep a LIMIT clause to bound the result.\n\n\
         Corrected SQL:"
    )
}

/// How many rows are inlined into the summary prompt.
pub const SUMMARY_SAMPLE_ROWS: usize = 5;

pub fn summary(question: &str, sql: &str, table: &TableData) -> String {
    let sample: Vec<&Vec<askdb_core::Scalar>> =
        table.rows.iter().take(SUMMARY_SAMPLE_ROWS).collect();
    let data = serde_json::json!({
        "columns": table.columns,
        "rows": sample,
    });
    format!(
        "Given a user's question, the SQL used, and the query results, write \
         a concise natural-language answer.\n\n\
         User question: {question}\n\
         SQL: {sql}\n\
         Results (first {} rows shown, {} total):\n{}\n\n\
         Guidelines:\n\
         - Answer directly from the rows shown; NEVER state a value that does \
           not appear in them.\n\
         - If there are zero rows, say that no data matched.\n\
         - Summarize many rows instead of listing them all.\n\
         - Keep it short and plain.\n\n\
         Answer:",
        sample.len(),
        table.row_count(),
        data
    )
}

pub fn suggestions(question: &str, answer: &str, context: &str) -> String {
    format!(
        "You suggest follow-up questions for a data exploration assistant.\n\n\
         Current question: {question}\n\
         Answer given: {}\n\
         {context}\n\n\
         Suggest up to 5 short follow-up questions that dig deeper: drill \
         into segments, compare periods, or chase outliers. One question per \
         line, each ending with a question mark, no numbering, no commentary.",
        truncate(answer, 300)
    )
}

pub fn visualization(question: &str, sql: &str, data_summary: &serde_json::Value) -> String {
    format!(
        "You are a data visualization expert. Recommend one chart kind for \
         these query results.\n\n\
         User question: {question}\n\
         SQL: {sql}\n\
         Data summary:\n{data_summary}\n\n\
         Allowed kinds: bar, horizontal_bar, line, pie, scatter, table, none.\n\
         Prefer line for time series, bar for category comparisons, \
         horizontal_bar for long labels, pie for proportions of few \
         categories, scatter for two numeric columns, table otherwise.\n\n\
         Respond with a single JSON object: \
         {{\"kind\": \"...\", \"reason\": \"...\"}}"
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}
