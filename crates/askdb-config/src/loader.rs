// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./askdb.toml` > `~/.config/askdb/askdb.toml` >
//! `/etc/askdb/askdb.toml`, with two environment override layers: the legacy
//! deployment keys (`LITELLM_API_BASE`, `TASK_TIME_LIMIT`, ...) and
//! `ASKDB_`-prefixed variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::AskdbConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/askdb/askdb.toml` (system-wide)
/// 3. `~/.config/askdb/askdb.toml` (user XDG config)
/// 4. `./askdb.toml` (local directory)
/// 5. Legacy deployment env keys (`LITELLM_API_BASE`, `SESSION_TTL`, ...)
/// 6. `ASKDB_*` environment variables
pub fn load_config() -> Result<AskdbConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AskdbConfig::default()))
        .merge(Toml::file("/etc/askdb/askdb.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("askdb/askdb.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("askdb.toml"))
        .merge(legacy_env_provider())
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<AskdbConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AskdbConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<AskdbConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(AskdbConfig::default()))
        .merge(Toml::file(path))
        .merge(legacy_env_provider())
        .merge(env_provider())
        .extract()
}

/// Create the `ASKDB_*` environment provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `ASKDB_LM_API_BASE` must map to
/// `lm.api_base`, not `lm.api.base`.
fn env_provider() -> Env {
    Env::prefixed("ASKDB_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("lm_", "lm.", 1)
            .replacen("connector_", "connector.", 1)
            .replacen("cache_", "cache.", 1)
            .replacen("memory_", "memory.", 1)
            .replacen("dispatch_", "dispatch.", 1)
            .replacen("schema_", "schema.", 1)
            .replacen("scheduler_", "scheduler.", 1)
            .replacen("routing_", "routing.", 1);
        mapped.into()
    })
}

/// The environment keys recognized from the upstream deployment, mapped onto
/// their dotted config paths.
const LEGACY_KEYS: &[(&str, &str)] = &[
    ("database_url", "connector.url"),
    ("redis_url", "cache.url"),
    ("litellm_api_base", "lm.api_base"),
    ("litellm_auth_header", "lm.auth_header"),
    ("litellm_model", "lm.model"),
    ("generation_temperature", "lm.generation_temperature"),
    ("summary_temperature", "lm.summary_temperature"),
    ("suggestion_temperature", "lm.suggestion_temperature"),
    ("enable_llm_cache", "lm.cache_enabled"),
    ("llm_cache_ttl", "lm.cache_ttl_secs"),
    ("query_cache_ttl", "cache.answer_ttl_secs"),
    ("schema_cache_ttl", "cache.schema_ttl_secs"),
    ("task_time_limit", "dispatch.standard.hard_time_limit_secs"),
    ("task_soft_time_limit", "dispatch.standard.soft_time_limit_secs"),
    ("worker_prefetch_multiplier", "dispatch.prefetch_multiplier"),
    ("worker_max_tasks_per_child", "dispatch.max_tasks_per_child"),
    ("session_ttl", "memory.session_ttl_secs"),
    ("history_limit", "memory.history_limit"),
    ("api_rate_limit", "lm.rate_limit_per_minute"),
    ("db_pool_size", "connector.pool_size"),
    ("db_max_overflow", "connector.max_overflow"),
    ("db_pool_timeout", "connector.pool_timeout_secs"),
    ("db_pool_recycle", "connector.pool_recycle_secs"),
];

/// Create the provider for un-prefixed legacy deployment keys.
///
/// `DATABASE_URL` and any `DATABASE_URL_<name>` variant map onto the single
/// connector endpoint; the core treats the connector as one collaborator.
fn legacy_env_provider() -> Env {
    Env::raw()
        .filter(|key| {
            let lower = key.as_str().to_lowercase();
            lower.starts_with("database_url") || LEGACY_KEYS.iter().any(|(k, _)| lower == *k)
        })
        .map(|key| {
            let lower = key.as_str().to_lowercase();
            if lower.starts_with("database_url") {
                return "connector.url".into();
            }
            LEGACY_KEYS
                .iter()
                .find(|(k, _)| lower == *k)
                .map(|(_, path)| (*path).into())
                .unwrap_or_else(|| lower.into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_key_table_paths_are_dotted() {
        for (key, path) in LEGACY_KEYS {
            assert!(path.contains('.'), "{key} maps to a non-dotted path");
        }
    }

    #[test]
    fn legacy_keys_cover_the_deployment_surface() {
        let keys: Vec<&str> = LEGACY_KEYS.iter().map(|(k, _)| *k).collect();
        for expected in [
            "redis_url",
            "litellm_api_base",
            "task_time_limit",
            "session_ttl",
            "history_limit",
            "api_rate_limit",
        ] {
            assert!(keys.contains(&expected), "missing legacy key {expected}");
        }
    }
}
