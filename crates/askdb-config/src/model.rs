// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Askdb core.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Askdb configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides (both `ASKDB_*` and the legacy deployment keys, see the loader).
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AskdbConfig {
    /// Pipeline behavior and logging.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Language-model endpoint and client policy.
    #[serde(default)]
    pub lm: LmConfig,

    /// Database connector settings.
    #[serde(default)]
    pub connector: ConnectorConfig,

    /// Cache backend and TTL policy.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Conversation memory settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Dispatcher and worker-pool settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Schema catalog settings.
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Periodic-task scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Job-to-pool routing settings.
    #[serde(default)]
    pub routing: RoutingConfig,
}

/// Pipeline behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Reject generated SQL whose leading verb is DDL/DML.
    #[serde(default = "default_read_only")]
    pub read_only: bool,

    /// Maximum LM correction calls before giving up on a failing SQL.
    #[serde(default = "default_max_correction_attempts")]
    pub max_correction_attempts: u32,

    /// Maximum accepted question length in bytes.
    #[serde(default = "default_question_max_bytes")]
    pub question_max_bytes: usize,

    /// LIMIT appended to generated statements that carry none.
    #[serde(default = "default_row_limit")]
    pub default_row_limit: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            read_only: default_read_only(),
            max_correction_attempts: default_max_correction_attempts(),
            question_max_bytes: default_question_max_bytes(),
            default_row_limit: default_row_limit(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_read_only() -> bool {
    true
}

fn default_max_correction_attempts() -> u32 {
    3
}

fn default_question_max_bytes() -> usize {
    4096
}

fn default_row_limit() -> u32 {
    100
}

/// Language-model endpoint and client policy.
///
/// Only temperature-0.0 responses are cached; higher-temperature calls
/// bypass the response cache regardless of `cache_enabled`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LmConfig {
    /// Base URL of the chat-completion endpoint.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Full value of the Authorization header, e.g. "Bearer sk-...".
    /// `None` sends no auth header.
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Model identifier sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for SQL generation (stage 5) and correction calls.
    #[serde(default = "default_generation_temperature")]
    pub generation_temperature: f32,

    /// Temperature for result summarization (stage 7).
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,

    /// Temperature for follow-up suggestions (stage 8).
    #[serde(default = "default_suggestion_temperature")]
    pub suggestion_temperature: f32,

    /// Token-bucket limit on outbound calls per minute.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    /// Consecutive failures that open the circuit breaker.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Breaker cooldown before a half-open probe is permitted.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Per-call deadline.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts for transient failures (network, 5xx, timeout).
    #[serde(default = "default_lm_max_retries")]
    pub max_retries: u32,

    /// Master switch for the LM response cache.
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// TTL for cached LM responses.
    #[serde(default = "default_lm_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl LmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            auth_header: None,
            model: default_model(),
            generation_temperature: default_generation_temperature(),
            summary_temperature: default_summary_temperature(),
            suggestion_temperature: default_suggestion_temperature(),
            rate_limit_per_minute: default_rate_limit(),
            failure_threshold: default_failure_threshold(),
            cooldown_secs: default_cooldown_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_lm_max_retries(),
            cache_enabled: default_cache_enabled(),
            cache_ttl_secs: default_lm_cache_ttl_secs(),
        }
    }
}

fn default_api_base() -> String {
    "http://localhost:4000".to_string()
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_generation_temperature() -> f32 {
    0.0
}

fn default_summary_temperature() -> f32 {
    0.3
}

fn default_suggestion_temperature() -> f32 {
    0.5
}

fn default_rate_limit() -> u32 {
    60
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_lm_max_retries() -> u32 {
    3
}

fn default_cache_enabled() -> bool {
    true
}

fn default_lm_cache_ttl_secs() -> u64 {
    300
}

/// Database connector configuration.
///
/// The pool_* keys mirror the deployment surface of the upstream service;
/// the SQLite connector records them but only `statement_timeout_secs`
/// affects execution.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectorConfig {
    /// Connector endpoint (path of the SQLite database).
    #[serde(default = "default_connector_url")]
    pub url: String,

    /// Per-statement execution timeout.
    #[serde(default = "default_statement_timeout_secs")]
    pub statement_timeout_secs: u64,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    #[serde(default = "default_max_overflow")]
    pub max_overflow: u32,

    #[serde(default = "default_pool_timeout_secs")]
    pub pool_timeout_secs: u64,

    #[serde(default = "default_pool_recycle_secs")]
    pub pool_recycle_secs: u64,
}

impl ConnectorConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            url: default_connector_url(),
            statement_timeout_secs: default_statement_timeout_secs(),
            pool_size: default_pool_size(),
            max_overflow: default_max_overflow(),
            pool_timeout_secs: default_pool_timeout_secs(),
            pool_recycle_secs: default_pool_recycle_secs(),
        }
    }
}

fn default_connector_url() -> String {
    "askdb.db".to_string()
}

fn default_statement_timeout_secs() -> u64 {
    20
}

fn default_pool_size() -> u32 {
    20
}

fn default_max_overflow() -> u32 {
    30
}

fn default_pool_timeout_secs() -> u64 {
    30
}

fn default_pool_recycle_secs() -> u64 {
    300
}

/// Cache backend and TTL policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache backend endpoint (path of the SQLite cache database).
    #[serde(default = "default_cache_url")]
    pub url: String,

    /// Soft cap on live entries; oldest entries are evicted past it.
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,

    /// TTL for complete answers keyed by normalized question + history digest.
    #[serde(default = "default_answer_ttl_secs")]
    pub answer_ttl_secs: u64,

    /// TTL for schema DDL snapshots.
    #[serde(default = "default_schema_ttl_secs")]
    pub schema_ttl_secs: u64,

    /// TTL for follow-up suggestion lists.
    #[serde(default = "default_suggestion_ttl_secs")]
    pub suggestion_ttl_secs: u64,
}

impl CacheConfig {
    pub fn answer_ttl(&self) -> Duration {
        Duration::from_secs(self.answer_ttl_secs)
    }

    pub fn schema_ttl(&self) -> Duration {
        Duration::from_secs(self.schema_ttl_secs)
    }

    pub fn suggestion_ttl(&self) -> Duration {
        Duration::from_secs(self.suggestion_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: default_cache_url(),
            capacity: default_cache_capacity(),
            answer_ttl_secs: default_answer_ttl_secs(),
            schema_ttl_secs: default_schema_ttl_secs(),
            suggestion_ttl_secs: default_suggestion_ttl_secs(),
        }
    }
}

fn default_cache_url() -> String {
    "askdb-cache.db".to_string()
}

fn default_cache_capacity() -> u64 {
    10_000
}

fn default_answer_ttl_secs() -> u64 {
    300
}

fn default_schema_ttl_secs() -> u64 {
    3600
}

fn default_suggestion_ttl_secs() -> u64 {
    300
}

/// Conversation memory configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Session TTL, refreshed on every access.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,

    /// Maximum history entries retained per session.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl MemoryConfig {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl_secs(),
            history_limit: default_history_limit(),
        }
    }
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

fn default_history_limit() -> usize {
    10
}

/// Per-pool worker settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// Concurrent workers in this pool.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Cooperative deadline: the job's cancellation flag is set here.
    pub soft_time_limit_secs: u64,

    /// Forced deadline: the in-flight stage is abandoned here.
    pub hard_time_limit_secs: u64,
}

impl PoolConfig {
    pub fn soft_limit(&self) -> Duration {
        Duration::from_secs(self.soft_time_limit_secs)
    }

    pub fn hard_limit(&self) -> Duration {
        Duration::from_secs(self.hard_time_limit_secs)
    }
}

fn default_workers() -> usize {
    4
}

/// Dispatcher and worker-pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Bounded queue capacity per pool; a full queue rejects with Overloaded.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Re-enqueue budget for transient failures.
    #[serde(default = "default_dispatch_max_retries")]
    pub max_retries: u32,

    /// Retained for deployment parity; not consulted by the in-process pools.
    #[serde(default = "default_prefetch_multiplier")]
    pub prefetch_multiplier: u32,

    /// Retained for deployment parity; not consulted by the in-process pools.
    #[serde(default = "default_max_tasks_per_child")]
    pub max_tasks_per_child: u32,

    /// Include the failing SQL in Failed records for operator debugging.
    #[serde(default = "default_expose_failed_sql")]
    pub expose_failed_sql: bool,

    /// Result-record TTL counted from the terminal write.
    #[serde(default = "default_result_ttl_secs")]
    pub result_ttl_secs: u64,

    #[serde(default = "default_simple_pool")]
    pub simple: PoolConfig,

    #[serde(default = "default_standard_pool")]
    pub standard: PoolConfig,

    #[serde(default = "default_complex_pool")]
    pub complex: PoolConfig,
}

impl DispatchConfig {
    pub fn result_ttl(&self) -> Duration {
        Duration::from_secs(self.result_ttl_secs)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_retries: default_dispatch_max_retries(),
            prefetch_multiplier: default_prefetch_multiplier(),
            max_tasks_per_child: default_max_tasks_per_child(),
            expose_failed_sql: default_expose_failed_sql(),
            result_ttl_secs: default_result_ttl_secs(),
            simple: default_simple_pool(),
            standard: default_standard_pool(),
            complex: default_complex_pool(),
        }
    }
}

fn default_queue_capacity() -> usize {
    100
}

fn default_dispatch_max_retries() -> u32 {
    3
}

fn default_prefetch_multiplier() -> u32 {
    1
}

fn default_max_tasks_per_child() -> u32 {
    1000
}

fn default_expose_failed_sql() -> bool {
    true
}

fn default_result_ttl_secs() -> u64 {
    3600
}

fn default_simple_pool() -> PoolConfig {
    PoolConfig {
        workers: default_workers(),
        soft_time_limit_secs: 25,
        hard_time_limit_secs: 30,
    }
}

fn default_standard_pool() -> PoolConfig {
    PoolConfig {
        workers: default_workers(),
        soft_time_limit_secs: 50,
        hard_time_limit_secs: 60,
    }
}

fn default_complex_pool() -> PoolConfig {
    PoolConfig {
        workers: default_workers(),
        soft_time_limit_secs: 110,
        hard_time_limit_secs: 120,
    }
}

/// Schema catalog configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    /// Scheduled refresh cadence.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl SchemaConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

fn default_refresh_interval_secs() -> u64 {
    3600
}

/// Periodic-task scheduler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,

    /// Cadence of the expired-entry sweep over the cache backend.
    #[serde(default = "default_sweep_interval_secs")]
    pub session_sweep_interval_secs: u64,

    /// Cadence of the metrics flush tick.
    #[serde(default = "default_metrics_flush_interval_secs")]
    pub metrics_flush_interval_secs: u64,
}

impl SchedulerConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session_sweep_interval_secs)
    }

    pub fn metrics_flush_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_flush_interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            session_sweep_interval_secs: default_sweep_interval_secs(),
            metrics_flush_interval_secs: default_metrics_flush_interval_secs(),
        }
    }
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_sweep_interval_secs() -> u64 {
    600
}

fn default_metrics_flush_interval_secs() -> u64 {
    60
}

/// Job-to-pool routing configuration.
///
/// Disabled routing sends every job to the standard pool.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Classify with a cacheable LM call before falling back to heuristics.
    #[serde(default)]
    pub use_lm: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            use_lm: false,
        }
    }
}
