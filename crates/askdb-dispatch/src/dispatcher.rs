// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The worker-pool dispatcher.
//!
//! Owns the concurrency model: bounded per-pool queues, semaphore-bounded
//! workers, the job state machine, two-phase time limits, and transient
//! re-enqueueing. `submit` never blocks: a full queue rejects with
//! Overloaded. Workers are tokio tasks; each processes one job at a time and
//! the pipeline inside a job is sequential.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use askdb_agent::SqlAgent;
use askdb_config::model::{AskdbConfig, PoolConfig};
use askdb_core::{AgentFailure, ErrorKind, JobId, ResultRecord, SessionId};

use crate::classifier::PoolRouter;
use crate::job::{PoolTier, QuestionJob};
use crate::results::ResultStore;

const RETRY_BACKOFF_BASE: Duration = Duration::from_millis(500);
const RETRY_BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Per-job cancellation state. The token is cancelled by the soft-limit
/// timer, by the hard-limit abandonment, or by an explicit `cancel` call;
/// the flag records which of those was user-initiated.
#[derive(Clone)]
struct JobControl {
    token: CancellationToken,
    user_cancelled: Arc<AtomicBool>,
}

impl JobControl {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            user_cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    fn was_user_cancelled(&self) -> bool {
        self.user_cancelled.load(Ordering::SeqCst)
    }
}

struct PoolHandle {
    tx: mpsc::Sender<QuestionJob>,
    capacity: usize,
}

/// Accepts jobs, runs them through worker pools, and persists results.
pub struct Dispatcher {
    pools: HashMap<PoolTier, PoolHandle>,
    results: ResultStore,
    controls: Mutex<HashMap<String, JobControl>>,
    router: PoolRouter,
    question_max_bytes: usize,
    max_retries: u32,
    expose_failed_sql: bool,
}

impl Dispatcher {
    /// Builds the dispatcher and spawns one distributor task per pool.
    /// All pool tasks stop when `shutdown` is cancelled.
    pub fn start(
        agent: Arc<SqlAgent>,
        results: ResultStore,
        router: PoolRouter,
        config: &AskdbConfig,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        let tiers = [
            (PoolTier::Simple, config.dispatch.simple.clone()),
            (PoolTier::Standard, config.dispatch.standard.clone()),
            (PoolTier::Complex, config.dispatch.complex.clone()),
        ];

        let mut pools = HashMap::new();
        let mut receivers = Vec::new();
        for (tier, pool_config) in tiers {
            let (tx, rx) = mpsc::channel(config.dispatch.queue_capacity);
            pools.insert(
                tier,
                PoolHandle {
                    tx,
                    capacity: config.dispatch.queue_capacity,
                },
            );
            receivers.push((tier, rx, pool_config));
        }

        let dispatcher = Arc::new(Self {
            pools,
            results,
            controls: Mutex::new(HashMap::new()),
            router,
            question_max_bytes: config.agent.question_max_bytes,
            max_retries: config.dispatch.max_retries,
            expose_failed_sql: config.dispatch.expose_failed_sql,
        });

        for (tier, rx, pool_config) in receivers {
            tokio::spawn(pool_loop(
                dispatcher.clone(),
                agent.clone(),
                tier,
                rx,
                pool_config,
                shutdown.clone(),
            ));
        }

        dispatcher
    }

    /// Enqueues a job and returns immediately with its id.
    pub async fn submit(
        &self,
        question: &str,
        session_id: Option<String>,
    ) -> Result<JobId, AgentFailure> {
        let trimmed = question.trim();
        if trimmed.is_empty() || question.len() > self.question_max_bytes {
            return Err(AgentFailure::new(ErrorKind::InvalidInput));
        }

        let tier = self.router.route(trimmed).await;
        let job = QuestionJob {
            id: JobId(uuid::Uuid::new_v4().to_string()),
            question: trimmed.to_string(),
            session_id: session_id.map(SessionId),
            tier,
            submitted_at: chrono::Utc::now().to_rfc3339(),
            attempt: 0,
        };

        self.controls
            .lock()
            .await
            .insert(job.id.0.clone(), JobControl::new());
        self.results.write(&job.id, &ResultRecord::Pending).await;

        let pool = &self.pools[&tier];
        match pool.tx.try_send(job.clone()) {
            Ok(()) => {
                let depth = pool.capacity - pool.tx.capacity();
                askdb_prometheus::set_queue_depth(&tier.to_string(), depth as f64);
                debug!(job_id = %job.id, tier = %tier, "job enqueued");
                Ok(job.id)
            }
            Err(TrySendError::Full(job)) => {
                warn!(tier = %tier, "queue full, rejecting submission");
                self.controls.lock().await.remove(&job.id.0);
                self.results.remove(&job.id).await;
                Err(AgentFailure::new(ErrorKind::Overloaded))
            }
            Err(TrySendError::Closed(job)) => {
                self.controls.lock().await.remove(&job.id.0);
                self.results.remove(&job.id).await;
                Err(AgentFailure::new(ErrorKind::InternalError))
            }
        }
    }

    /// Reads the current state of a job.
    pub async fn poll(&self, job_id: &str) -> Result<ResultRecord, AgentFailure> {
        self.results
            .read(&JobId(job_id.to_string()))
            .await
            .ok_or_else(|| AgentFailure::new(ErrorKind::UnknownJob))
    }

    /// Flags a job for cooperative cancellation. Returns false when the job
    /// is already terminal (or unknown).
    pub async fn cancel(&self, job_id: &str) -> bool {
        let controls = self.controls.lock().await;
        match controls.get(job_id) {
            Some(control) => {
                control.user_cancelled.store(true, Ordering::SeqCst);
                control.token.cancel();
                true
            }
            None => false,
        }
    }

    async fn run_job(self: Arc<Self>, agent: Arc<SqlAgent>, job: QuestionJob, pool: &PoolConfig) {
        let Some(control) = self.controls.lock().await.get(&job.id.0).cloned() else {
            return;
        };

        if control.token.is_cancelled() {
            // Cancelled while still queued.
            let record = if control.was_user_cancelled() {
                ResultRecord::Cancelled
            } else {
                ResultRecord::failed(ErrorKind::Timeout)
            };
            self.finish(&job, record, 0.0).await;
            return;
        }

        let started = std::time::Instant::now();
        self.results
            .write(
                &job.id,
                &ResultRecord::Running {
                    started_at: chrono::Utc::now().to_rfc3339(),
                },
            )
            .await;

        // Soft limit: ask the worker to finish up by cancelling its token.
        let soft_token = control.token.clone();
        let soft_limit = pool.soft_limit();
        let soft_timer = tokio::spawn(async move {
            tokio::time::sleep(soft_limit).await;
            debug!("soft time limit reached, setting cancellation flag");
            soft_token.cancel();
        });

        // Hard limit: abandon the in-flight stage outright.
        let outcome = tokio::select! {
            result = agent.answer(&job.question, job.session_id.as_ref(), &control.token) => {
                Some(result)
            }
            _ = tokio::time::sleep(pool.hard_limit()) => None,
        };
        soft_timer.abort();
        let elapsed = started.elapsed().as_secs_f64();

        match outcome {
            Some(Ok(payload)) => {
                self.finish(&job, ResultRecord::Succeeded { payload }, elapsed)
                    .await;
            }
            Some(Err(failure)) => {
                if control.was_user_cancelled() && failure.kind == ErrorKind::Timeout {
                    self.finish(&job, ResultRecord::Cancelled, elapsed).await;
                } else if failure.retryable
                    && job.attempt < self.max_retries
                    && !control.token.is_cancelled()
                {
                    self.clone().requeue(job, failure).await;
                } else {
                    let error = self.redact(failure);
                    self.finish(&job, ResultRecord::Failed { error }, elapsed)
                        .await;
                }
            }
            None => {
                // Hard-limit abandonment. The agent future was dropped, so
                // this terminal write is the only write that can happen.
                control.token.cancel();
                warn!(job_id = %job.id, "hard time limit reached, job abandoned");
                let record = if control.was_user_cancelled() {
                    ResultRecord::Cancelled
                } else {
                    ResultRecord::failed(ErrorKind::Timeout)
                };
                self.finish(&job, record, elapsed).await;
            }
        }
    }

    /// Puts a transiently-failed job back on its queue with back-off.
    async fn requeue(self: Arc<Self>, job: QuestionJob, failure: AgentFailure) {
        let mut retry = job;
        retry.attempt += 1;
        let exponent = retry.attempt.saturating_sub(1).min(8);
        let delay = (RETRY_BACKOFF_BASE * 2u32.pow(exponent)).min(RETRY_BACKOFF_CAP);
        info!(
            job_id = %retry.id,
            attempt = retry.attempt,
            delay_ms = delay.as_millis() as u64,
            kind = %failure.kind,
            "transient failure, re-enqueueing"
        );
        askdb_prometheus::record_job_retry(&retry.tier.to_string());
        self.results.write(&retry.id, &ResultRecord::Pending).await;

        let dispatcher = self;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let tx = dispatcher.pools[&retry.tier].tx.clone();
            if tx.try_send(retry.clone()).is_err() {
                warn!(job_id = %retry.id, "re-enqueue failed, terminal");
                let error = dispatcher.redact(failure);
                dispatcher
                    .finish(&retry, ResultRecord::Failed { error }, 0.0)
                    .await;
            }
        });
    }

    async fn finish(&self, job: &QuestionJob, record: ResultRecord, elapsed: f64) {
        let state = match &record {
            ResultRecord::Succeeded { .. } => "succeeded",
            ResultRecord::Failed { .. } => "failed",
            ResultRecord::Cancelled => "cancelled",
            _ => "other",
        };
        self.results.write(&job.id, &record).await;
        self.controls.lock().await.remove(&job.id.0);
        askdb_prometheus::record_job_terminal(&job.tier.to_string(), state);
        askdb_prometheus::record_job_duration(&job.tier.to_string(), elapsed);
        info!(job_id = %job.id, state, "job reached terminal state");
    }

    /// Drops the failing SQL from records when the deployment says so.
    fn redact(&self, mut failure: AgentFailure) -> AgentFailure {
        if !self.expose_failed_sql {
            failure.sql = None;
        }
        failure
    }
}

async fn pool_loop(
    dispatcher: Arc<Dispatcher>,
    agent: Arc<SqlAgent>,
    tier: PoolTier,
    mut rx: mpsc::Receiver<QuestionJob>,
    pool_config: PoolConfig,
    shutdown: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(pool_config.workers.max(1)));
    info!(tier = %tier, workers = pool_config.workers, "worker pool started");

    loop {
        // A job is only dequeued once a worker slot is free; everything else
        // stays in the bounded queue, which is what makes `submit` observe
        // back-pressure.
        let permit = tokio::select! {
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
            _ = shutdown.cancelled() => break,
        };

        let job = tokio::select! {
            maybe_job = rx.recv() => match maybe_job {
                Some(job) => job,
                None => break,
            },
            _ = shutdown.cancelled() => break,
        };

        let dispatcher = dispatcher.clone();
        let agent = agent.clone();
        let pool_config = pool_config.clone();
        tokio::spawn(async move {
            dispatcher.run_job(agent, job, &pool_config).await;
            drop(permit);
        });
    }

    info!(tier = %tier, "worker pool stopped");
}
