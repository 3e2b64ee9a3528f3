// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Askdb configuration system.

use askdb_config::model::AskdbConfig;
use askdb_config::{load_config_from_str, validate};

/// Valid TOML with fields from every section deserializes successfully.
#[test]
fn valid_toml_deserializes_into_askdb_config() {
    let toml = r#"
[agent]
log_level = "debug"
read_only = false
max_correction_attempts = 2

[lm]
api_base = "http://llm.internal:4000"
auth_header = "Bearer test-token"
model = "gpt-4.1-mini"
generation_temperature = 0.0
rate_limit_per_minute = 120

[connector]
url = "/tmp/test.db"
statement_timeout_secs = 10

[cache]
url = "/tmp/test-cache.db"
answer_ttl_secs = 60

[memory]
session_ttl_secs = 3600
history_limit = 5

[dispatch]
queue_capacity = 16
max_retries = 1

[dispatch.standard]
workers = 2
soft_time_limit_secs = 5
hard_time_limit_secs = 8

[routing]
enabled = true
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.log_level, "debug");
    assert!(!config.agent.read_only);
    assert_eq!(config.agent.max_correction_attempts, 2);
    assert_eq!(config.lm.api_base, "http://llm.internal:4000");
    assert_eq!(config.lm.auth_header.as_deref(), Some("Bearer test-token"));
    assert_eq!(config.lm.rate_limit_per_minute, 120);
    assert_eq!(config.connector.url, "/tmp/test.db");
    assert_eq!(config.connector.statement_timeout_secs, 10);
    assert_eq!(config.cache.answer_ttl_secs, 60);
    assert_eq!(config.memory.history_limit, 5);
    assert_eq!(config.dispatch.queue_capacity, 16);
    assert_eq!(config.dispatch.standard.workers, 2);
    assert_eq!(config.dispatch.standard.soft_time_limit_secs, 5);
    assert!(config.routing.enabled);
}

/// Missing sections use defaults matching the documented deployment surface.
#[test]
fn missing_sections_use_documented_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");

    assert_eq!(config.agent.log_level, "info");
    assert!(config.agent.read_only);
    assert_eq!(config.agent.max_correction_attempts, 3);
    assert_eq!(config.agent.question_max_bytes, 4096);

    assert_eq!(config.lm.generation_temperature, 0.0);
    assert_eq!(config.lm.summary_temperature, 0.3);
    assert_eq!(config.lm.suggestion_temperature, 0.5);
    assert_eq!(config.lm.rate_limit_per_minute, 60);
    assert_eq!(config.lm.failure_threshold, 5);
    assert_eq!(config.lm.cooldown_secs, 30);
    assert_eq!(config.lm.request_timeout_secs, 15);
    assert!(config.lm.cache_enabled);
    assert_eq!(config.lm.cache_ttl_secs, 300);

    assert_eq!(config.connector.statement_timeout_secs, 20);
    assert_eq!(config.connector.pool_size, 20);
    assert_eq!(config.connector.max_overflow, 30);

    assert_eq!(config.cache.answer_ttl_secs, 300);
    assert_eq!(config.cache.schema_ttl_secs, 3600);

    assert_eq!(config.memory.session_ttl_secs, 86_400);
    assert_eq!(config.memory.history_limit, 10);

    assert_eq!(config.dispatch.standard.soft_time_limit_secs, 50);
    assert_eq!(config.dispatch.standard.hard_time_limit_secs, 60);
    assert_eq!(config.dispatch.standard.workers, 4);
    assert_eq!(config.dispatch.max_retries, 3);
    assert_eq!(config.dispatch.result_ttl_secs, 3600);

    assert_eq!(config.schema.refresh_interval_secs, 3600);
    assert!(!config.routing.enabled);
}

/// Unknown field in a section is rejected by deny_unknown_fields.
#[test]
fn unknown_field_produces_error() {
    let toml = r#"
[lm]
api_bse = "http://typo.example"
"#;

    let err = load_config_from_str(toml).expect_err("should reject unknown field");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("api_bse"),
        "error should mention unknown field or the bad key, got: {err_str}"
    );
}

/// Unexpected top-level section is rejected.
#[test]
fn deny_unknown_fields_at_top_level() {
    let toml = r#"
[celery]
broker = "redis://x"
"#;

    let err = load_config_from_str(toml).expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("celery"),
        "error should mention unknown field, got: {err_str}"
    );
}

/// Dotted overrides merge over TOML, mirroring how env providers layer in.
#[test]
fn dotted_override_wins_over_toml() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let toml_content = r#"
[lm]
model = "from-toml"
"#;

    let config: AskdbConfig = Figment::new()
        .merge(Serialized::defaults(AskdbConfig::default()))
        .merge(Toml::string(toml_content))
        .merge(("lm.model", "from-env"))
        .extract()
        .expect("should merge override");

    assert_eq!(config.lm.model, "from-env");
}

/// Legacy dotted paths used by the loader resolve to real fields.
#[test]
fn legacy_paths_resolve() {
    use figment::{providers::Serialized, Figment};

    let config: AskdbConfig = Figment::new()
        .merge(Serialized::defaults(AskdbConfig::default()))
        .merge(("cache.url", "redis://cache:6379/0"))
        .merge(("dispatch.standard.hard_time_limit_secs", 90u64))
        .merge(("lm.rate_limit_per_minute", 30u32))
        .extract()
        .expect("legacy paths should extract");

    assert_eq!(config.cache.url, "redis://cache:6379/0");
    assert_eq!(config.dispatch.standard.hard_time_limit_secs, 90);
    assert_eq!(config.lm.rate_limit_per_minute, 30);
}

/// Invalid type (string where number expected) produces a clear message.
#[test]
fn invalid_type_message() {
    let toml = r#"
[memory]
history_limit = "ten"
"#;

    let err = load_config_from_str(toml).expect_err("should reject invalid type");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("invalid type") || err_str.contains("history_limit"),
        "error should mention type mismatch, got: {err_str}"
    );
}

/// Missing config files are silently skipped (Figment's Toml::file behavior).
#[test]
fn missing_config_files_silently_skipped() {
    use figment::{
        providers::{Format, Serialized, Toml},
        Figment,
    };

    let config: AskdbConfig = Figment::new()
        .merge(Serialized::defaults(AskdbConfig::default()))
        .merge(Toml::file("/nonexistent/path/askdb.toml"))
        .extract()
        .expect("missing file should be silently skipped");

    assert_eq!(config.agent.log_level, "info");
}

/// Defaults pass semantic validation.
#[test]
fn defaults_pass_validation() {
    let config = AskdbConfig::default();
    assert!(validate(&config).is_ok());
}

/// A config with an inverted time-limit pair fails validation with a
/// message naming the pool.
#[test]
fn validation_rejects_inverted_limits() {
    let toml = r#"
[dispatch.complex]
workers = 4
soft_time_limit_secs = 120
hard_time_limit_secs = 100
"#;
    let config = load_config_from_str(toml).expect("shape is valid");
    let errors = validate(&config).expect_err("semantics are not");
    assert!(errors.iter().any(|e| e.contains("dispatch.complex")));
}
