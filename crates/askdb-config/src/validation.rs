// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic validation applied after deserialization.
//!
//! Figment + serde catch shape errors (unknown keys, type mismatches); this
//! module checks cross-field constraints that serde cannot express.

use crate::model::AskdbConfig;

/// Validate cross-field constraints. Returns all violations, not just the first.
pub fn validate(config: &AskdbConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    for (name, pool) in [
        ("simple", &config.dispatch.simple),
        ("standard", &config.dispatch.standard),
        ("complex", &config.dispatch.complex),
    ] {
        if pool.soft_time_limit_secs >= pool.hard_time_limit_secs {
            errors.push(format!(
                "dispatch.{name}: soft_time_limit_secs ({}) must be below hard_time_limit_secs ({})",
                pool.soft_time_limit_secs, pool.hard_time_limit_secs
            ));
        }
        if pool.workers == 0 {
            errors.push(format!("dispatch.{name}: workers must be at least 1"));
        }
    }

    if config.dispatch.queue_capacity == 0 {
        errors.push("dispatch.queue_capacity must be at least 1".to_string());
    }

    for (name, t) in [
        ("generation_temperature", config.lm.generation_temperature),
        ("summary_temperature", config.lm.summary_temperature),
        ("suggestion_temperature", config.lm.suggestion_temperature),
    ] {
        if !(0.0..=2.0).contains(&t) {
            errors.push(format!("lm.{name} ({t}) must be within 0.0..=2.0"));
        }
    }

    if config.lm.rate_limit_per_minute == 0 {
        errors.push("lm.rate_limit_per_minute must be at least 1".to_string());
    }

    if config.memory.history_limit == 0 {
        errors.push("memory.history_limit must be at least 1".to_string());
    }

    if config.agent.question_max_bytes == 0 {
        errors.push("agent.question_max_bytes must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate(&AskdbConfig::default()).is_ok());
    }

    #[test]
    fn soft_limit_must_be_below_hard_limit() {
        let mut config = AskdbConfig::default();
        config.dispatch.standard.soft_time_limit_secs = 60;
        config.dispatch.standard.hard_time_limit_secs = 60;
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("dispatch.standard")));
    }

    #[test]
    fn temperature_range_enforced() {
        let mut config = AskdbConfig::default();
        config.lm.suggestion_temperature = 3.5;
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("suggestion_temperature")));
    }

    #[test]
    fn zero_history_limit_rejected() {
        let mut config = AskdbConfig::default();
        config.memory.history_limit = 0;
        assert!(validate(&config).is_err());
    }
}
