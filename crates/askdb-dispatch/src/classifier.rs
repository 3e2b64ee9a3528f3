// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Question complexity classification for pool routing.
//!
//! The heuristic path is zero-cost: scored signals over the question text.
//! When enabled, a cacheable temperature-0 LM call refines the tier, with
//! the heuristic as the fallback on any failure. Routing disabled sends
//! everything to the standard pool.

use std::sync::Arc;

use tracing::debug;

use askdb_core::{CompletionRequest, LmProvider};

use crate::job::PoolTier;

/// Single-fact lookups and counts that a cheap pool answers fast.
const SIMPLE_PATTERNS: &[&str] = &[
    "how many",
    "count of",
    "total number",
    "what is the",
    "list the",
    "show me the",
];

/// Signals of multi-table or analytical work.
const COMPLEX_PATTERNS: &[&str] = &[
    "compare",
    "correlat",
    "trend",
    "over time",
    "breakdown",
    "distribution",
    "join",
    "versus",
    " vs ",
    "year over year",
    "month over month",
    "cohort",
];

/// Scored heuristic classifier.
pub struct QuestionClassifier;

impl QuestionClassifier {
    pub fn classify(question: &str) -> PoolTier {
        let lower = question.trim().to_lowercase();
        let mut score: i32 = 0;

        let word_count = lower.split_whitespace().count();
        score += match word_count {
            0..=6 => -1,
            7..=20 => 0,
            _ => 1,
        };

        if SIMPLE_PATTERNS.iter().any(|p| lower.contains(p)) {
            score -= 2;
        }
        if COMPLEX_PATTERNS.iter().any(|p| lower.contains(p)) {
            score += 2;
        }
        // Multiple grouping dimensions push work up a tier.
        let groupings = lower.matches(" by ").count() + lower.matches(" per ").count();
        if groupings >= 2 {
            score += 1;
        }

        if score <= -2 {
            PoolTier::Simple
        } else if score >= 2 {
            PoolTier::Complex
        } else {
            PoolTier::Standard
        }
    }
}

/// Routes jobs to pools, optionally consulting the LM.
pub struct PoolRouter {
    enabled: bool,
    lm: Option<Arc<dyn LmProvider>>,
}

impl PoolRouter {
    /// `lm` is consulted only when both routing and `use_lm` are on; the
    /// call goes out at temperature 0 and is therefore served from the LM
    /// response cache for repeated questions.
    pub fn new(enabled: bool, lm: Option<Arc<dyn LmProvider>>) -> Self {
        Self { enabled, lm }
    }

    pub async fn route(&self, question: &str) -> PoolTier {
        if !self.enabled {
            return PoolTier::Standard;
        }

        if let Some(lm) = &self.lm {
            let request = CompletionRequest::new(
                format!(
                    "Classify the complexity of this analytics question as one \
                     word: simple, standard, or complex.\n\nQuestion: {question}\n\n\
                     Answer with exactly one word."
                ),
                0.0,
            );
            match lm.complete(&request).await {
                Ok(text) => {
                    let word = text.trim().to_lowercase();
                    if let Ok(tier) = word.parse::<PoolTier>() {
                        return tier;
                    }
                    debug!(response = word.as_str(), "unparseable tier, falling back");
                }
                Err(e) => {
                    debug!(error = %e, "LM classification failed, falling back");
                }
            }
        }

        QuestionClassifier::classify(question)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_test_utils::{MockLm, Reply};

    #[test]
    fn short_counts_classify_simple() {
        assert_eq!(
            QuestionClassifier::classify("How many users?"),
            PoolTier::Simple
        );
        assert_eq!(
            QuestionClassifier::classify("Count of orders?"),
            PoolTier::Simple
        );
    }

    #[test]
    fn analytical_questions_classify_complex() {
        assert_eq!(
            QuestionClassifier::classify(
                "Compare the revenue trend over time by region and by product line"
            ),
            PoolTier::Complex
        );
    }

    #[test]
    fn middling_questions_classify_standard() {
        assert_eq!(
            QuestionClassifier::classify("Which customers signed up last month in Spain?"),
            PoolTier::Standard
        );
    }

    #[tokio::test]
    async fn disabled_routing_is_all_standard() {
        let router = PoolRouter::new(false, None);
        assert_eq!(router.route("How many users?").await, PoolTier::Standard);
    }

    #[tokio::test]
    async fn enabled_routing_uses_the_heuristic() {
        let router = PoolRouter::new(true, None);
        assert_eq!(router.route("How many users?").await, PoolTier::Simple);
    }

    #[tokio::test]
    async fn lm_verdict_wins_when_parseable() {
        let lm = Arc::new(MockLm::with_texts(vec!["complex"]));
        let router = PoolRouter::new(true, Some(lm));
        assert_eq!(router.route("How many users?").await, PoolTier::Complex);
    }

    #[tokio::test]
    async fn lm_failure_falls_back_to_heuristic() {
        let lm = Arc::new(MockLm::with_replies(vec![Reply::Unavailable]));
        let router = PoolRouter::new(true, Some(lm));
        assert_eq!(router.route("How many users?").await, PoolTier::Simple);
    }

    #[tokio::test]
    async fn lm_gibberish_falls_back_to_heuristic() {
        let lm = Arc::new(MockLm::with_texts(vec!["hard to say!"]));
        let router = PoolRouter::new(true, Some(lm));
        assert_eq!(router.route("How many users?").await, PoolTier::Simple);
    }
}
