// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric recording helpers.

/// Record a job reaching a terminal state.
pub fn record_job_terminal(pool: &str, state: &str) {
    metrics::counter!(
        "askdb_jobs_total",
        "pool" => pool.to_string(),
        "state" => state.to_string()
    )
    .increment(1);
}

/// Record a transient-failure re-enqueue.
pub fn record_job_retry(pool: &str) {
    metrics::counter!("askdb_job_retries_total", "pool" => pool.to_string()).increment(1);
}

/// Set the current queue depth for a pool.
pub fn set_queue_depth(pool: &str, depth: f64) {
    metrics::gauge!("askdb_queue_depth", "pool" => pool.to_string()).set(depth);
}

/// Record a cache hit for a namespace.
pub fn record_cache_hit(namespace: &str) {
    metrics::counter!("askdb_cache_hits_total", "namespace" => namespace.to_string()).increment(1);
}

/// Record a cache miss for a namespace.
pub fn record_cache_miss(namespace: &str) {
    metrics::counter!("askdb_cache_misses_total", "namespace" => namespace.to_string())
        .increment(1);
}

/// Record an outbound LM call outcome ("ok", "error", "timeout").
pub fn record_lm_call(outcome: &str) {
    metrics::counter!("askdb_lm_calls_total", "outcome" => outcome.to_string()).increment(1);
}

/// Flag the LM circuit breaker state.
pub fn set_breaker_open(open: bool) {
    metrics::gauge!("askdb_lm_breaker_open").set(if open { 1.0 } else { 0.0 });
}

/// Record how long a job took from pickup to terminal state.
pub fn record_job_duration(pool: &str, seconds: f64) {
    metrics::histogram!("askdb_job_duration_seconds", "pool" => pool.to_string()).record(seconds);
}

/// Record outbound LM call latency.
pub fn record_lm_latency(seconds: f64) {
    metrics::histogram!("askdb_lm_latency_seconds").record(seconds);
}

/// Record one scheduler tick for a periodic task.
pub fn record_scheduler_tick(task: &str) {
    metrics::counter!("askdb_scheduler_ticks_total", "task" => task.to_string()).increment(1);
}
