// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lenient handling of LM response text.
//!
//! Models routinely wrap answers in Markdown code fences; a stage must never
//! fail solely because of that wrapping.

/// Strips a leading/trailing Markdown code fence (with an optional language
/// tag) and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }

    let mut body = &trimmed[3..];
    // Drop the language tag line, e.g. "sql" or "json".
    if let Some(newline) = body.find('\n') {
        let tag = body[..newline].trim();
        if tag.chars().all(|c| c.is_ascii_alphanumeric()) {
            body = &body[newline + 1..];
        }
    }
    if let Some(stripped) = body.strip_suffix("```") {
        body = stripped;
    }
    body.trim().to_string()
}

/// Extracts a JSON value from response text: fences are stripped first, and
/// if the whole body does not parse, the outermost `{...}` or `[...]` slice
/// is tried.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let body = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str(&body) {
        return Some(value);
    }

    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (body.find(open), body.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str(&body[start..=end]) {
                    return Some(value);
                }
            }
        }
    }
    None
}
