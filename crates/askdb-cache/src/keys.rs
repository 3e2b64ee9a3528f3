// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache key derivation.
//!
//! Every namespace has a named derivation function so the inputs that
//! determine an output are explicit and unit-tested. Two independent writers
//! computing a key from the same inputs must produce the same fingerprint;
//! all derivations hash a canonical JSON rendering of the inputs.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `namespace` plus the canonical input rendering.
fn fingerprint(namespace: &str, canonical_inputs: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical_inputs.as_bytes());
    hex_encode(&hasher.finalize())
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// Hex-encoded SHA-256 of arbitrary text. Used for content digests that feed
/// other keys (history digest, answer digest).
pub fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Lowercase and collapse internal whitespace. Questions differing only in
/// spacing or case share an answer-cache entry.
pub fn normalize_question(question: &str) -> String {
    question
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Key for a cached LM response: `(system_prompt, user_prompt, temperature,
/// model_id)` uniquely determine the output at temperature zero.
pub fn lm_response_key(
    system_prompt: Option<&str>,
    user_prompt: &str,
    temperature: f32,
    model_id: &str,
) -> String {
    let canonical = serde_json::json!([system_prompt, user_prompt, temperature, model_id]);
    fingerprint(super::ns::LM_RESPONSE, &canonical.to_string())
}

/// Digest of the trailing question/summary pairs of a session, newest last.
///
/// Feeds the answer key so two sessions with identical recent context can
/// share answers while diverging histories cannot.
pub fn history_digest(pairs: &[(&str, &str)]) -> String {
    let canonical = serde_json::json!(pairs);
    digest(&canonical.to_string())
}

/// Key for a cached complete answer.
pub fn answer_key(normalized_question: &str, session_history_digest: &str) -> String {
    let canonical = serde_json::json!([normalized_question, session_history_digest]);
    fingerprint(super::ns::ANSWER, &canonical.to_string())
}

/// Key for a cached DDL snapshot: the table name itself.
pub fn schema_key(table: &str) -> String {
    table.to_string()
}

/// Key for a cached suggestion list.
pub fn suggestion_key(question: &str, formatted_answer_digest: &str) -> String {
    let canonical = serde_json::json!([question, formatted_answer_digest]);
    fingerprint(super::ns::SUGGESTION, &canonical.to_string())
}
