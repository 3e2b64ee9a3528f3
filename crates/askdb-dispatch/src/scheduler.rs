// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic-task runner: schema refresh, expired-entry sweep, metrics flush.
//!
//! Each periodic task is guarded by an advisory lease in the cache's `lock`
//! namespace with a lifetime of twice the task period, so when several
//! processes share a cache backend only the lease holder executes the work.
//! Missed ticks are skipped, never replayed.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use askdb_cache::{ns, Cache};
use askdb_config::AskdbConfig;
use askdb_schema::SchemaCatalog;

pub struct Scheduler {
    cache: Cache,
    catalog: SchemaCatalog,
    instance_id: String,
    schema_interval: Duration,
    sweep_interval: Duration,
    metrics_interval: Duration,
}

impl Scheduler {
    pub fn new(cache: Cache, catalog: SchemaCatalog, config: &AskdbConfig) -> Self {
        Self {
            cache,
            catalog,
            instance_id: uuid::Uuid::new_v4().to_string(),
            schema_interval: config.schema.refresh_interval(),
            sweep_interval: config.scheduler.sweep_interval(),
            metrics_interval: config.scheduler.metrics_flush_interval(),
        }
    }

    /// Spawns the scheduler loop; it stops when `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(self, cancel: CancellationToken) {
        let mut schema_tick = tokio::time::interval(self.schema_interval);
        let mut sweep_tick = tokio::time::interval(self.sweep_interval);
        let mut metrics_tick = tokio::time::interval(self.metrics_interval);
        for tick in [&mut schema_tick, &mut sweep_tick, &mut metrics_tick] {
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // Consume the immediate first tick; work starts one period in.
            tick.tick().await;
        }

        info!(
            schema_secs = self.schema_interval.as_secs(),
            sweep_secs = self.sweep_interval.as_secs(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = schema_tick.tick() => {
                    if self.try_lead("schema_refresh", self.schema_interval).await {
                        match self.catalog.refresh().await {
                            Ok(tables) => debug!(tables, "scheduled schema refresh complete"),
                            Err(e) => warn!(error = %e, "scheduled schema refresh failed"),
                        }
                    }
                }
                _ = sweep_tick.tick() => {
                    if self.try_lead("session_sweep", self.sweep_interval).await {
                        let purged = self.cache.purge_expired().await;
                        if purged > 0 {
                            debug!(purged, "expired cache entries swept");
                        }
                    }
                }
                _ = metrics_tick.tick() => {
                    askdb_prometheus::record_scheduler_tick("metrics_flush");
                }
                _ = cancel.cancelled() => {
                    info!("scheduler shutting down");
                    break;
                }
            }
        }
    }

    /// Advisory leader election: holds (or takes over) the task lease for
    /// 2x the period. Returns true when this instance should run the task.
    async fn try_lead(&self, task: &str, period: Duration) -> bool {
        let key = format!("lease:{task}");
        let lease_ttl = period * 2;

        if let Some(holder) = self.cache.get(ns::LOCK, &key).await {
            if holder == self.instance_id.as_bytes() {
                // Refresh our own lease.
                self.cache
                    .put(ns::LOCK, &key, self.instance_id.as_bytes(), lease_ttl)
                    .await;
                return true;
            }
            debug!(task, "another instance holds the lease");
            return false;
        }

        self.cache
            .put_if_absent(ns::LOCK, &key, self.instance_id.as_bytes(), lease_ttl)
            .await
    }
}
