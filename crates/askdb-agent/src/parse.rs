// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-stage defensive parsing of LM responses.
//!
//! Each extractor accepts the structured shape it asked for and falls back
//! to free-text recovery; a stage never fails solely because the model
//! wrapped its answer in prose or code fences.

use askdb_lm::parse::extract_json;

/// A parse result that remembers which path produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum LmOutput<T> {
    /// The response parsed as the requested structure.
    Parsed(T),
    /// Structure recovery failed; the raw text was mined instead.
    Textual(T),
}

impl<T> LmOutput<T> {
    pub fn into_inner(self) -> T {
        match self {
            LmOutput::Parsed(v) | LmOutput::Textual(v) => v,
        }
    }
}

/// Extracts the chosen table set from a table-selection response.
///
/// Accepts (a) a JSON array of names, filtered against the known tables, or
/// (b) free text from which known table names are recovered by substring
/// match. The result only ever contains known tables.
pub fn table_selection(response: &str, known_tables: &[String]) -> LmOutput<Vec<String>> {
    if let Some(serde_json::Value::Array(items)) = extract_json(response) {
        let mut chosen = Vec::new();
        for item in items {
            if let serde_json::Value::String(name) = item {
                if let Some(canonical) = known_tables
                    .iter()
                    .find(|t| t.eq_ignore_ascii_case(name.trim()))
                {
                    if !chosen.contains(canonical) {
                        chosen.push(canonical.clone());
                    }
                }
            }
        }
        if !chosen.is_empty() {
            return LmOutput::Parsed(chosen);
        }
    }

    let lower = response.to_lowercase();
    let recovered: Vec<String> = known_tables
        .iter()
        .filter(|t| lower.contains(&t.to_lowercase()))
        .cloned()
        .collect();
    LmOutput::Textual(recovered)
}

/// Extracts up to `cap` follow-up questions from a suggestion response.
///
/// Accepts numbered or bulleted lines, strips the markers, keeps only
/// question-like lines, and deduplicates while preserving order.
pub fn suggestions(response: &str, cap: usize) -> Vec<String> {
    let mut seen = Vec::new();
    for line in response.lines() {
        let cleaned = line
            .trim()
            .trim_start_matches(|c: char| {
                c.is_ascii_digit() || matches!(c, '.' | ')' | '-' | '*' | '•' | ' ')
            })
            .trim()
            .to_string();
        if cleaned.is_empty() || !cleaned.contains('?') {
            continue;
        }
        if seen
            .iter()
            .any(|s: &String| s.eq_ignore_ascii_case(&cleaned))
        {
            continue;
        }
        seen.push(cleaned);
        if seen.len() == cap {
            break;
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<String> {
        vec!["users".to_string(), "orders".to_string(), "products".to_string()]
    }

    #[test]
    fn json_array_selection_is_parsed() {
        let result = table_selection(r#"["users", "orders"]"#, &known());
        assert_eq!(
            result,
            LmOutput::Parsed(vec!["users".to_string(), "orders".to_string()])
        );
    }

    #[test]
    fn fenced_json_selection_is_parsed() {
        let result = table_selection("```json\n[\"users\"]\n```", &known());
        assert_eq!(result, LmOutput::Parsed(vec!["users".to_string()]));
    }

    #[test]
    fn unknown_names_are_dropped() {
        let result = table_selection(r#"["users", "customers"]"#, &known());
        assert_eq!(result.into_inner(), vec!["users".to_string()]);
    }

    #[test]
    fn case_mismatch_maps_to_canonical_name() {
        let result = table_selection(r#"["USERS"]"#, &known());
        assert_eq!(result.into_inner(), vec!["users".to_string()]);
    }

    #[test]
    fn free_text_falls_back_to_substring_recovery() {
        let result = table_selection(
            "You probably want the users table joined with orders.",
            &known(),
        );
        assert_eq!(
            result,
            LmOutput::Textual(vec!["users".to_string(), "orders".to_string()])
        );
    }

    #[test]
    fn nothing_recoverable_yields_empty_textual() {
        let result = table_selection("I cannot tell.", &known());
        assert_eq!(result, LmOutput::Textual(vec![]));
    }

    #[test]
    fn suggestions_strip_markers_and_cap() {
        let response = "1. Top 5 recent users?\n2) Users per month?\n- Not a question\n* Growth by region?\n• Churn rate by cohort?\nSomething else?\nSeventh question?";
        let parsed = suggestions(response, 5);
        assert_eq!(parsed.len(), 5);
        assert_eq!(parsed[0], "Top 5 recent users?");
        assert_eq!(parsed[1], "Users per month?");
        assert_eq!(parsed[2], "Growth by region?");
    }

    #[test]
    fn suggestions_deduplicate_case_insensitively() {
        let response = "Top users?\nTOP USERS?\nOther question?";
        let parsed = suggestions(response, 5);
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn non_questions_are_filtered() {
        assert!(suggestions("Here are some ideas.\nLook at revenue.", 5).is_empty());
    }
}
