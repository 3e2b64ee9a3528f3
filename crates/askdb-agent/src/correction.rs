// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded-retry correction of failing SQL.
//!
//! State machine: Start -> Analyze -> Execute -> (Analyze | Done). Each
//! Analyze is one LM call that proposes a replacement statement from the
//! error and the DDL bundle; each Execute runs it through the connector.
//! Local hygiene (fence stripping, emptiness, the read-only filter) is free
//! and never counts against the attempt budget. The graph owns no state
//! beyond its loop variables and never touches the caller's.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use askdb_core::{AskdbError, CompletionRequest, LmProvider, SqlConnector, TableData};

use crate::{prompts, sqlfix};

/// Terminal outcome of a correction run.
#[derive(Debug)]
pub enum CorrectionOutcome {
    /// A corrected statement executed; `attempts` LM calls were spent.
    Corrected {
        sql: String,
        table: TableData,
        attempts: u32,
    },
    /// The budget ran out. Carries the last statement and error for the
    /// caller to classify and surface.
    GaveUp {
        last_sql: String,
        last_error: String,
        attempts: u32,
    },
}

/// Tunables the graph needs from the agent.
pub struct CorrectionSettings {
    pub max_attempts: u32,
    pub generation_temperature: f32,
    pub statement_timeout: Duration,
    pub read_only: bool,
}

/// Runs the correction loop for one failing statement.
///
/// Infrastructure failures (LM unavailable, transient connector loss) abort
/// the run with `Err`; exhausting the budget is the `GaveUp` outcome, not an
/// error.
pub async fn run(
    lm: &dyn LmProvider,
    connector: &dyn SqlConnector,
    settings: &CorrectionSettings,
    question: &str,
    failing_sql: &str,
    error_message: &str,
    ddl_bundle: &[(String, String)],
    cancel: &CancellationToken,
) -> Result<CorrectionOutcome, AskdbError> {
    let mut last_sql = failing_sql.to_string();
    let mut last_error = error_message.to_string();
    let mut attempts = 0u32;

    while attempts < settings.max_attempts {
        if cancel.is_cancelled() {
            debug!("correction abandoned at cancellation check");
            break;
        }

        // Analyze: one LM call proposing a replacement.
        let prompt = prompts::correction(question, &last_sql, &last_error, ddl_bundle);
        let request = CompletionRequest::new(prompt, settings.generation_temperature);
        let response = lm.complete(&request).await?;
        attempts += 1;

        let sql = sqlfix::clean_statement(&response);
        if sql.is_empty() {
            last_error = "correction produced an empty statement".to_string();
            continue;
        }
        if settings.read_only {
            if let Some(verb) = sqlfix::forbidden_verb(&sql) {
                last_sql = sql;
                last_error = format!("statement rejected: {verb} is not permitted here");
                continue;
            }
        }

        // Execute: run the candidate through the connector.
        match connector.execute(&sql, settings.statement_timeout).await {
            Ok(table) => {
                debug!(attempts, "correction succeeded");
                return Ok(CorrectionOutcome::Corrected {
                    sql,
                    table,
                    attempts,
                });
            }
            Err(e) if e.is_transient() => {
                // The database went away, not the statement; surface it.
                return Err(AskdbError::Connector(e));
            }
            Err(e) => {
                warn!(attempt = attempts, error = %e, "corrected statement still fails");
                last_error = e.to_string();
                last_sql = sql;
            }
        }
    }

    Ok(CorrectionOutcome::GaveUp {
        last_sql,
        last_error,
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use askdb_core::ConnectorError;
    use askdb_test_utils::{count_table, MockConnector, MockLm, Reply};

    fn settings(max_attempts: u32) -> CorrectionSettings {
        CorrectionSettings {
            max_attempts,
            generation_temperature: 0.0,
            statement_timeout: Duration::from_secs(5),
            read_only: true,
        }
    }

    fn ddl() -> Vec<(String, String)> {
        vec![(
            "users".to_string(),
            "CREATE TABLE users (\n    id INTEGER NOT NULL\n);".to_string(),
        )]
    }

    #[tokio::test]
    async fn first_correction_can_succeed() {
        let lm = MockLm::with_texts(vec!["SELECT COUNT(*) FROM users LIMIT 1"]);
        let connector = MockConnector::users_fixture();
        connector.script_ok(count_table(3)).await;

        let outcome = run(
            &lm,
            &connector,
            &settings(3),
            "How many users?",
            "SELECT COUNT(*) FROM user",
            "no such table: user",
            &ddl(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        match outcome {
            CorrectionOutcome::Corrected { sql, attempts, .. } => {
                assert_eq!(attempts, 1);
                assert!(sql.contains("FROM users"));
            }
            other => panic!("expected Corrected, got {other:?}"),
        }
        assert_eq!(lm.calls(), 1);
    }

    #[tokio::test]
    async fn exhausts_budget_after_exactly_max_attempts_lm_calls() {
        let lm = MockLm::with_texts(vec![
            "SELECT bogus FROM users",
            "SELECT bogus FROM users",
            "SELECT bogus FROM users",
        ]);
        let connector = MockConnector::users_fixture();
        for _ in 0..3 {
            connector
                .script_err(ConnectorError::Syntax("no such column: bogus".into()))
                .await;
        }

        let outcome = run(
            &lm,
            &connector,
            &settings(3),
            "q",
            "SELECT broken",
            "syntax error",
            &ddl(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        match outcome {
            CorrectionOutcome::GaveUp {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("bogus"));
            }
            other => panic!("expected GaveUp, got {other:?}"),
        }
        assert_eq!(lm.calls(), 3, "exactly max_attempts correction calls");
    }

    #[tokio::test]
    async fn zero_budget_makes_no_lm_calls() {
        let lm = MockLm::new();
        let connector = MockConnector::users_fixture();

        let outcome = run(
            &lm,
            &connector,
            &settings(0),
            "q",
            "SELECT broken",
            "syntax error",
            &ddl(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        match outcome {
            CorrectionOutcome::GaveUp { attempts, .. } => assert_eq!(attempts, 0),
            other => panic!("expected GaveUp, got {other:?}"),
        }
        assert_eq!(lm.calls(), 0);
        assert!(connector.executed().await.is_empty());
    }

    #[tokio::test]
    async fn write_statements_are_rejected_without_executing() {
        let lm = MockLm::with_texts(vec![
            "DROP TABLE users",
            "SELECT COUNT(*) FROM users LIMIT 1",
        ]);
        let connector = MockConnector::users_fixture();
        connector.script_ok(count_table(3)).await;

        let outcome = run(
            &lm,
            &connector,
            &settings(3),
            "q",
            "SELECT broken",
            "syntax error",
            &ddl(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(matches!(outcome, CorrectionOutcome::Corrected { .. }));
        let executed = connector.executed().await;
        assert_eq!(executed.len(), 1, "the DROP never reached the connector");
        assert!(executed[0].starts_with("SELECT"));
    }

    #[tokio::test]
    async fn lm_failure_aborts_the_graph() {
        let lm = MockLm::with_replies(vec![Reply::Unavailable]);
        let connector = MockConnector::users_fixture();

        let result = run(
            &lm,
            &connector,
            &settings(3),
            "q",
            "SELECT broken",
            "err",
            &ddl(),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(AskdbError::Provider { .. })));
    }

    #[tokio::test]
    async fn cancellation_stops_the_loop() {
        let lm = MockLm::with_texts(vec!["SELECT COUNT(*) FROM users"]);
        let connector = MockConnector::users_fixture();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = run(
            &lm,
            &connector,
            &settings(3),
            "q",
            "SELECT broken",
            "err",
            &ddl(),
            &cancel,
        )
        .await
        .unwrap();

        assert!(matches!(
            outcome,
            CorrectionOutcome::GaveUp { attempts: 0, .. }
        ));
        assert_eq!(lm.calls(), 0);
    }
}
