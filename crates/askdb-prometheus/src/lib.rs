// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration for the Askdb core.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics.

pub mod recording;

pub use recording::*;

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Askdb metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("askdb_jobs_total", "Jobs by terminal state");
    describe_counter!("askdb_job_retries_total", "Transient-failure re-enqueues");
    describe_gauge!("askdb_queue_depth", "Queued jobs per pool");
    describe_counter!("askdb_cache_hits_total", "Cache hits per namespace");
    describe_counter!("askdb_cache_misses_total", "Cache misses per namespace");
    describe_counter!("askdb_lm_calls_total", "Outbound LM calls by outcome");
    describe_gauge!("askdb_lm_breaker_open", "1 while the LM circuit is open");
    describe_histogram!(
        "askdb_job_duration_seconds",
        "Wall time from pickup to terminal state"
    );
    describe_histogram!(
        "askdb_lm_latency_seconds",
        "Outbound LM call latency in seconds"
    );
    describe_counter!(
        "askdb_scheduler_ticks_total",
        "Scheduler ticks per periodic task"
    );
}
