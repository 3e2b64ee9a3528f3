// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The six-stage question pipeline.
//!
//! Load context -> answer-cache check -> choose tables -> DDL bundle ->
//! generate SQL -> execute (with correction) -> summarize -> suggest ->
//! persist. Stages run sequentially within one job; concurrency lives in the
//! dispatcher. The agent checks its cancellation token at every stage
//! boundary and never throws across the worker boundary: every failure is a
//! classified [`AgentFailure`].

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use askdb_cache::{keys, ns, Cache};
use askdb_config::AskdbConfig;
use askdb_core::{
    AgentFailure, AnswerPayload, AskdbError, CompletionRequest, ErrorKind, LmProvider, SessionId,
    SqlConnector, TableData,
};
use askdb_memory::ConversationMemory;
use askdb_schema::SchemaCatalog;

use crate::correction::{self, CorrectionOutcome, CorrectionSettings};
use crate::{parse, prompts, sqlfix};

/// Pipeline tunables lifted out of the full config.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub generation_temperature: f32,
    pub summary_temperature: f32,
    pub suggestion_temperature: f32,
    pub read_only: bool,
    pub max_correction_attempts: u32,
    pub default_row_limit: u32,
    pub statement_timeout: Duration,
    pub answer_ttl: Duration,
    pub suggestion_ttl: Duration,
    /// How many trailing history entries feed prompts and the answer key.
    pub history_window: usize,
}

impl AgentSettings {
    pub fn from_config(config: &AskdbConfig) -> Self {
        Self {
            generation_temperature: config.lm.generation_temperature,
            summary_temperature: config.lm.summary_temperature,
            suggestion_temperature: config.lm.suggestion_temperature,
            read_only: config.agent.read_only,
            max_correction_attempts: config.agent.max_correction_attempts,
            default_row_limit: config.agent.default_row_limit,
            statement_timeout: config.connector.statement_timeout(),
            answer_ttl: config.cache.answer_ttl(),
            suggestion_ttl: config.cache.suggestion_ttl(),
            history_window: config.memory.history_limit.min(5),
        }
    }
}

/// Composes the cache, memory, catalog, LM, and connector into answers.
pub struct SqlAgent {
    lm: Arc<dyn LmProvider>,
    connector: Arc<dyn SqlConnector>,
    catalog: SchemaCatalog,
    memory: ConversationMemory,
    cache: Cache,
    settings: AgentSettings,
}

impl SqlAgent {
    pub fn new(
        lm: Arc<dyn LmProvider>,
        connector: Arc<dyn SqlConnector>,
        catalog: SchemaCatalog,
        memory: ConversationMemory,
        cache: Cache,
        settings: AgentSettings,
    ) -> Self {
        Self {
            lm,
            connector,
            catalog,
            memory,
            cache,
            settings,
        }
    }

    /// Answers one question. The token is cancelled by the dispatcher at the
    /// soft time limit or on explicit cancellation; it is honored at every
    /// stage boundary.
    pub async fn answer(
        &self,
        question: &str,
        session: Option<&SessionId>,
        cancel: &CancellationToken,
    ) -> Result<AnswerPayload, AgentFailure> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AgentFailure::new(ErrorKind::InvalidInput));
        }

        // Stage 1: load context.
        let history = match session {
            Some(s) => self.memory.recent(s, self.settings.history_window).await,
            None => Vec::new(),
        };
        let context = prompts::context_block(&history);
        self.checkpoint(cancel)?;

        // Stage 2: answer cache check.
        let normalized = keys::normalize_question(question);
        let digest = self.history_digest(session).await;
        let answer_key = keys::answer_key(&normalized, &digest);
        if let Some(payload) = self
            .cache
            .get_json::<AnswerPayload>(ns::ANSWER, &answer_key)
            .await
        {
            debug!("answer served from cache");
            return Ok(payload);
        }

        // Stage 3: choose tables.
        let tables = self.catalog.tables().await.map_err(|e| fail(&e))?;
        if tables.is_empty() {
            return Err(AgentFailure::new(ErrorKind::NoRelevantTables));
        }
        let selection = self
            .lm
            .complete(&CompletionRequest::new(
                prompts::table_selection(question, &context, &tables),
                self.settings.generation_temperature,
            ))
            .await
            .map_err(|e| fail(&e))?;
        let chosen = parse::table_selection(&selection, &tables).into_inner();
        if chosen.is_empty() {
            return Err(AgentFailure::new(ErrorKind::NoRelevantTables));
        }
        debug!(tables = ?chosen, "tables chosen");
        self.checkpoint(cancel)?;

        // Stage 4: collect DDLs, insertion order stable.
        let mut ddl_bundle = Vec::with_capacity(chosen.len());
        for table in &chosen {
            let ddl = self.catalog.ddl(table).await.map_err(|e| fail(&e))?;
            ddl_bundle.push((table.clone(), ddl));
        }
        self.checkpoint(cancel)?;

        // Stage 5: generate SQL at temperature 0 (cacheable).
        let raw = self
            .lm
            .complete(&CompletionRequest::new(
                prompts::sql_generation(
                    question,
                    &context,
                    &ddl_bundle,
                    self.settings.default_row_limit,
                ),
                self.settings.generation_temperature,
            ))
            .await
            .map_err(|e| fail(&e))?;
        let sql = sqlfix::clean_statement(&raw);
        if sql.is_empty() {
            return Err(AgentFailure::new(ErrorKind::SqlSynthesisFailed));
        }
        if !sqlfix::references_known_table(&sql, &tables) {
            warn!(sql = sql.as_str(), "generated SQL references no known table");
            return Err(AgentFailure::new(ErrorKind::SqlSynthesisFailed).with_sql(sql));
        }
        self.checkpoint(cancel)?;

        // Stage 6: execute, correcting on failure.
        let (final_sql, table, correction_applied) = self
            .execute_with_correction(question, sql, &ddl_bundle, cancel)
            .await?;
        self.checkpoint(cancel)?;

        // Stage 7: format results.
        let summary = self.summarize(question, &final_sql, &table).await;
        self.checkpoint(cancel)?;

        // Stage 8: follow-up suggestions.
        let suggestions = self.suggest(question, &summary, &context).await;

        let payload = AnswerPayload {
            sql: final_sql,
            summary,
            table,
            suggestions,
            correction_applied,
        };

        // Stage 9: persist. The answer key is recomputed over the history
        // that now includes this interaction, so re-asking the unchanged
        // question hits the cache.
        if let Some(s) = session {
            self.memory
                .append(s, question, &payload.sql, &payload.summary)
                .await;
        }
        let digest = self.history_digest(session).await;
        let store_key = keys::answer_key(&normalized, &digest);
        self.cache
            .put_json(ns::ANSWER, &store_key, &payload, self.settings.answer_ttl)
            .await;

        info!(
            rows = payload.table.row_count(),
            corrected = payload.correction_applied,
            "question answered"
        );
        Ok(payload)
    }

    async fn execute_with_correction(
        &self,
        question: &str,
        sql: String,
        ddl_bundle: &[(String, String)],
        cancel: &CancellationToken,
    ) -> Result<(String, TableData, bool), AgentFailure> {
        let first_error = if self.settings.read_only {
            sqlfix::forbidden_verb(&sql)
                .map(|verb| format!("statement rejected: {verb} is not permitted here"))
        } else {
            None
        };

        let error_message = match first_error {
            Some(message) => message,
            None => match self
                .connector
                .execute(&sql, self.settings.statement_timeout)
                .await
            {
                Ok(table) => return Ok((sql, table, false)),
                Err(e) if e.is_transient() => {
                    return Err(fail(&AskdbError::Connector(e)).with_sql(sql));
                }
                Err(e) => e.to_string(),
            },
        };

        warn!(error = error_message.as_str(), "statement failed, entering correction");
        let outcome = correction::run(
            self.lm.as_ref(),
            self.connector.as_ref(),
            &CorrectionSettings {
                max_attempts: self.settings.max_correction_attempts,
                generation_temperature: self.settings.generation_temperature,
                statement_timeout: self.settings.statement_timeout,
                read_only: self.settings.read_only,
            },
            question,
            &sql,
            &error_message,
            ddl_bundle,
            cancel,
        )
        .await
        .map_err(|e| fail(&e).with_sql(sql.clone()))?;

        match outcome {
            CorrectionOutcome::Corrected {
                sql, table, attempts,
            } => {
                info!(attempts, "correction applied");
                Ok((sql, table, true))
            }
            CorrectionOutcome::GaveUp {
                last_sql, attempts, ..
            } => {
                warn!(attempts, "correction exhausted");
                Err(AgentFailure::new(ErrorKind::SqlExecutionFailed).with_sql(last_sql))
            }
        }
    }

    /// Stage 7. Zero rows short-circuit to a canned sentence (nothing to
    /// hallucinate from); an LM failure after a good execution falls back to
    /// a canned apology rather than failing the whole job.
    async fn summarize(&self, question: &str, sql: &str, table: &TableData) -> String {
        if table.rows.is_empty() {
            return "No data matched that question.".to_string();
        }
        let request = CompletionRequest::new(
            prompts::summary(question, sql, table),
            self.settings.summary_temperature,
        );
        match self.lm.complete(&request).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "summary call failed, using fallback text");
                "I found the data but had trouble summarizing it.".to_string()
            }
        }
    }

    /// Stage 8. Suggestions are cached on (question, answer digest) and
    /// degrade to an empty list when the LM is unavailable.
    async fn suggest(&self, question: &str, summary: &str, context: &str) -> Vec<String> {
        let key = keys::suggestion_key(question, &keys::digest(summary));
        if let Some(cached) = self.cache.get_json::<Vec<String>>(ns::SUGGESTION, &key).await {
            return cached;
        }

        let request = CompletionRequest::new(
            prompts::suggestions(question, summary, context),
            self.settings.suggestion_temperature,
        );
        match self.lm.complete(&request).await {
            Ok(text) => {
                let suggestions = parse::suggestions(&text, 5);
                self.cache
                    .put_json(ns::SUGGESTION, &key, &suggestions, self.settings.suggestion_ttl)
                    .await;
                suggestions
            }
            Err(e) => {
                warn!(error = %e, "suggestion call failed, returning none");
                Vec::new()
            }
        }
    }

    async fn history_digest(&self, session: Option<&SessionId>) -> String {
        match session {
            Some(s) => {
                self.memory
                    .history_digest(s, self.settings.history_window)
                    .await
            }
            None => keys::history_digest(&[]),
        }
    }

    fn checkpoint(&self, cancel: &CancellationToken) -> Result<(), AgentFailure> {
        if cancel.is_cancelled() {
            debug!("pipeline unwinding at cancellation checkpoint");
            Err(AgentFailure::new(ErrorKind::Timeout))
        } else {
            Ok(())
        }
    }
}

fn fail(err: &AskdbError) -> AgentFailure {
    AgentFailure::from_error(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    use askdb_cache::Cache;
    use askdb_core::{ConnectorError, Scalar};
    use askdb_test_utils::{count_table, MemoryCache, MockConnector, MockLm, Reply};

    struct Fixture {
        lm: Arc<MockLm>,
        connector: Arc<MockConnector>,
        memory: ConversationMemory,
        agent: SqlAgent,
    }

    fn settings() -> AgentSettings {
        AgentSettings {
            generation_temperature: 0.0,
            summary_temperature: 0.3,
            suggestion_temperature: 0.5,
            read_only: true,
            max_correction_attempts: 3,
            default_row_limit: 100,
            statement_timeout: Duration::from_secs(5),
            answer_ttl: Duration::from_secs(300),
            suggestion_ttl: Duration::from_secs(300),
            history_window: 5,
        }
    }

    fn fixture_with(lm: MockLm, connector: MockConnector, settings: AgentSettings) -> Fixture {
        let lm = Arc::new(lm);
        let connector = Arc::new(connector);
        let cache = Cache::new(Arc::new(MemoryCache::new()));
        let catalog = SchemaCatalog::new(
            connector.clone(),
            cache.clone(),
            Duration::from_secs(3600),
        );
        let memory = ConversationMemory::new(cache.clone(), Duration::from_secs(3600), 10);
        let agent = SqlAgent::new(
            lm.clone(),
            connector.clone(),
            catalog,
            memory.clone(),
            cache,
            settings,
        );
        Fixture {
            lm,
            connector,
            memory,
            agent,
        }
    }

    /// LM script for one clean pass: table choice, SQL, summary, suggestions.
    fn happy_script() -> Vec<Reply> {
        vec![
            Reply::text(r#"["users"]"#),
            Reply::text("SELECT COUNT(*) FROM users;"),
            Reply::text("There are 3 users."),
            Reply::text("Top 5 recent users?\nUsers per month?"),
        ]
    }

    fn session() -> SessionId {
        SessionId("s-1".to_string())
    }

    #[tokio::test]
    async fn happy_path_produces_full_payload() {
        let connector = MockConnector::users_fixture();
        let fx = fixture_with(MockLm::with_replies(happy_script()), connector, settings());
        fx.connector.script_ok(count_table(3)).await;

        let payload = fx
            .agent
            .answer("How many users?", Some(&session()), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(payload.sql, "SELECT COUNT(*) FROM users;");
        assert_eq!(payload.summary, "There are 3 users.");
        assert_eq!(payload.table.columns, vec!["count"]);
        assert_eq!(payload.table.rows, vec![vec![Scalar::Int(3)]]);
        assert_eq!(payload.suggestions.len(), 2);
        assert!(!payload.correction_applied);
        assert_eq!(fx.lm.calls(), 4);

        // Success appended exactly one history entry.
        let history = fx.memory.recent(&session(), 10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].question, "How many users?");
    }

    #[tokio::test]
    async fn repeat_question_hits_the_answer_cache() {
        let connector = MockConnector::users_fixture();
        let fx = fixture_with(MockLm::with_replies(happy_script()), connector, settings());
        fx.connector.script_ok(count_table(3)).await;

        let first = fx
            .agent
            .answer("How many users?", Some(&session()), &CancellationToken::new())
            .await
            .unwrap();
        let calls_after_first = fx.lm.calls();

        // Same normalized question, unchanged history: byte-equal payload,
        // zero further LM calls.
        let second = fx
            .agent
            .answer("  how   many USERS? ", Some(&session()), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(fx.lm.calls(), calls_after_first);
        assert_eq!(fx.connector.executed().await.len(), 1);
    }

    #[tokio::test]
    async fn correction_recovers_from_a_bad_statement() {
        let connector = MockConnector::users_fixture();
        let script = vec![
            Reply::text(r#"["users"]"#),
            Reply::text("SELECT COUNT(*) FROM user;"),
            Reply::text("SELECT COUNT(*) FROM users;"),
            Reply::text("There are 3 users."),
            Reply::text("Top 5 recent users?"),
        ];
        let fx = fixture_with(MockLm::with_replies(script), connector, settings());
        fx.connector
            .script_err(ConnectorError::Syntax(
                "no such table: user".into(),
            ))
            .await;
        fx.connector.script_ok(count_table(3)).await;

        let payload = fx
            .agent
            .answer("How many users?", Some(&session()), &CancellationToken::new())
            .await
            .unwrap();

        assert!(payload.correction_applied);
        assert_eq!(payload.sql, "SELECT COUNT(*) FROM users;");
        assert_eq!(payload.table.rows[0][0], Scalar::Int(3));
    }

    #[tokio::test]
    async fn exhausted_correction_surfaces_execution_failure() {
        let connector = MockConnector::users_fixture();
        let script = vec![
            Reply::text(r#"["users"]"#),
            Reply::text("SELECT nope FROM users;"),
            Reply::text("SELECT nope FROM users;"),
            Reply::text("SELECT nope FROM users;"),
            Reply::text("SELECT nope FROM users;"),
        ];
        let fx = fixture_with(MockLm::with_replies(script), connector, settings());
        for _ in 0..4 {
            fx.connector
                .script_err(ConnectorError::Syntax("no such column: nope".into()))
                .await;
        }

        let failure = fx
            .agent
            .answer("How many users?", Some(&session()), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::SqlExecutionFailed);
        assert!(failure.sql.is_some());
        // 1 selection + 1 generation + 3 corrections.
        assert_eq!(fx.lm.calls(), 5);

        // A failed run must not append to conversation memory.
        assert!(fx.memory.recent(&session(), 10).await.is_empty());
    }

    #[tokio::test]
    async fn zero_correction_budget_fails_on_first_error() {
        let connector = MockConnector::users_fixture();
        let mut s = settings();
        s.max_correction_attempts = 0;
        let script = vec![
            Reply::text(r#"["users"]"#),
            Reply::text("SELECT nope FROM users;"),
        ];
        let fx = fixture_with(MockLm::with_replies(script), connector, s);
        fx.connector
            .script_err(ConnectorError::Syntax("no such column: nope".into()))
            .await;

        let failure = fx
            .agent
            .answer("How many users?", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::SqlExecutionFailed);
        assert_eq!(fx.lm.calls(), 2, "no correction calls were made");
    }

    #[tokio::test]
    async fn empty_table_choice_is_no_relevant_tables() {
        let connector = MockConnector::users_fixture();
        let script = vec![Reply::text("[]")];
        let fx = fixture_with(MockLm::with_replies(script), connector, settings());

        let failure = fx
            .agent
            .answer("What is the weather?", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::NoRelevantTables);
        assert_eq!(
            failure.message,
            "I'm not sure which data this refers to."
        );
    }

    #[tokio::test]
    async fn free_text_table_choice_recovers_by_substring() {
        let connector = MockConnector::users_fixture();
        let script = vec![
            Reply::text("You likely need the users table."),
            Reply::text("SELECT COUNT(*) FROM users;"),
            Reply::text("There are 3 users."),
            Reply::text("More?"),
        ];
        let fx = fixture_with(MockLm::with_replies(script), connector, settings());
        fx.connector.script_ok(count_table(3)).await;

        let payload = fx
            .agent
            .answer("How many users?", None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(payload.table.rows[0][0], Scalar::Int(3));
    }

    #[tokio::test]
    async fn sql_naming_no_known_table_is_synthesis_failure() {
        let connector = MockConnector::users_fixture();
        let script = vec![
            Reply::text(r#"["users"]"#),
            Reply::text("SELECT COUNT(*) FROM customers;"),
        ];
        let fx = fixture_with(MockLm::with_replies(script), connector, settings());

        let failure = fx
            .agent
            .answer("How many users?", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::SqlSynthesisFailed);
        assert!(fx.connector.executed().await.is_empty());
    }

    #[tokio::test]
    async fn lm_outage_maps_to_lm_unavailable() {
        let connector = MockConnector::users_fixture();
        let fx = fixture_with(
            MockLm::with_replies(vec![Reply::Unavailable]),
            connector,
            settings(),
        );

        let failure = fx
            .agent
            .answer("How many users?", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::LmUnavailable);
        assert!(failure.retryable);
    }

    #[tokio::test]
    async fn cancelled_token_unwinds_without_persisting() {
        let connector = MockConnector::users_fixture();
        let fx = fixture_with(MockLm::with_replies(happy_script()), connector, settings());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let failure = fx
            .agent
            .answer("How many users?", Some(&session()), &cancel)
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::Timeout);
        assert!(fx.memory.recent(&session(), 10).await.is_empty());
    }

    #[tokio::test]
    async fn empty_result_summary_is_deterministic() {
        let connector = MockConnector::users_fixture();
        let script = vec![
            Reply::text(r#"["users"]"#),
            Reply::text("SELECT name FROM users WHERE id > 99;"),
            // No summary call is scripted; zero rows skip the LM.
            Reply::text("Broaden the filter?"),
        ];
        let fx = fixture_with(MockLm::with_replies(script), connector, settings());
        fx.connector
            .script_ok(TableData {
                columns: vec!["name".into()],
                rows: vec![],
            })
            .await;

        let payload = fx
            .agent
            .answer("Which users have id over 99?", None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(payload.summary, "No data matched that question.");
        assert_eq!(fx.lm.calls(), 3, "summary stage made no LM call");
    }

    #[tokio::test]
    async fn suggestion_outage_degrades_to_empty_list() {
        let connector = MockConnector::users_fixture();
        let script = vec![
            Reply::text(r#"["users"]"#),
            Reply::text("SELECT COUNT(*) FROM users;"),
            Reply::text("There are 3 users."),
            Reply::Unavailable,
        ];
        let fx = fixture_with(MockLm::with_replies(script), connector, settings());
        fx.connector.script_ok(count_table(3)).await;

        let payload = fx
            .agent
            .answer("How many users?", None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(payload.suggestions.is_empty());
        assert_eq!(payload.summary, "There are 3 users.");
    }

    #[tokio::test]
    async fn blank_question_is_invalid_input() {
        let connector = MockConnector::users_fixture();
        let fx = fixture_with(MockLm::new(), connector, settings());
        let failure = fx
            .agent
            .answer("   ", None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::InvalidInput);
        assert_eq!(fx.lm.calls(), 0);
    }
}
