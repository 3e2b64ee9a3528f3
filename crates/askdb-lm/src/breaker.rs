// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Circuit breaker for the LM dependency.
//!
//! States: CLOSED -> OPEN -> HALF_OPEN -> CLOSED. After `threshold`
//! consecutive failures the breaker opens and calls fail fast. Once the
//! cooldown elapses the breaker goes half-open and admits exactly one probe;
//! the probe's outcome decides between closing and reopening with a fresh
//! cooldown.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { probing: bool },
}

/// Three-state breaker shared by all workers.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            state: Mutex::new(State::Closed { failures: 0 }),
        }
    }

    /// Whether a call may go out right now. Transitions OPEN to HALF_OPEN
    /// when the cooldown has elapsed; in HALF_OPEN only the first caller
    /// gets the probe slot.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        match *state {
            State::Closed { .. } => true,
            State::Open { opened_at } => {
                if opened_at.elapsed() >= self.cooldown {
                    info!("circuit breaker half-open, admitting probe");
                    *state = State::HalfOpen { probing: true };
                    true
                } else {
                    false
                }
            }
            State::HalfOpen { probing } => {
                if probing {
                    false
                } else {
                    *state = State::HalfOpen { probing: true };
                    true
                }
            }
        }
    }

    /// Records a successful call.
    pub fn on_success(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        if matches!(*state, State::HalfOpen { .. }) {
            info!("circuit breaker closed after successful probe");
        }
        *state = State::Closed { failures: 0 };
        askdb_prometheus::set_breaker_open(false);
    }

    /// Records a failed call; may open the breaker.
    pub fn on_failure(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        match *state {
            State::Closed { failures } => {
                let failures = failures + 1;
                if failures >= self.threshold {
                    warn!(failures, "circuit breaker opened");
                    *state = State::Open {
                        opened_at: Instant::now(),
                    };
                    askdb_prometheus::set_breaker_open(true);
                } else {
                    *state = State::Closed { failures };
                }
            }
            State::HalfOpen { .. } => {
                warn!("probe failed, circuit breaker reopened");
                *state = State::Open {
                    opened_at: Instant::now(),
                };
                askdb_prometheus::set_breaker_open(true);
            }
            State::Open { .. } => {}
        }
    }

    /// Releases an admitted slot without an outcome (e.g. the rate limiter
    /// deadline expired before any call went out).
    pub fn on_abandoned(&self) {
        let mut state = self.state.lock().expect("breaker lock poisoned");
        if let State::HalfOpen { probing: true } = *state {
            *state = State::HalfOpen { probing: false };
        }
    }

    /// True while calls would fail fast.
    pub fn is_open(&self) -> bool {
        let state = self.state.lock().expect("breaker lock poisoned");
        matches!(*state, State::Open { opened_at } if opened_at.elapsed() < self.cooldown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn opens_after_exactly_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(30));
        breaker.on_failure();
        breaker.on_failure();
        assert!(breaker.try_acquire(), "two failures keep it closed");
        breaker.on_failure();
        assert!(!breaker.try_acquire(), "third failure opens it");
        assert!(breaker.is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_the_failure_streak() {
        let breaker = CircuitBreaker::new(2, Duration::from_secs(30));
        breaker.on_failure();
        breaker.on_success();
        breaker.on_failure();
        assert!(breaker.try_acquire(), "streak was broken by a success");
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_admits_a_single_probe() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        breaker.on_failure();
        assert!(!breaker.try_acquire());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(breaker.try_acquire(), "cooldown elapsed, probe admitted");
        assert!(!breaker.try_acquire(), "only one probe at a time");
    }

    #[tokio::test(start_paused = true)]
    async fn successful_probe_closes() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        breaker.on_failure();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(breaker.try_acquire());
        breaker.on_success();
        assert!(breaker.try_acquire());
        assert!(breaker.try_acquire(), "closed again, no probe gating");
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_reopens_with_fresh_cooldown() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        breaker.on_failure();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(breaker.try_acquire());
        breaker.on_failure();
        assert!(!breaker.try_acquire(), "reopened");
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!breaker.try_acquire(), "fresh cooldown still running");
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(breaker.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_probe_frees_the_slot() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(30));
        breaker.on_failure();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(breaker.try_acquire());
        breaker.on_abandoned();
        assert!(breaker.try_acquire(), "slot was released without an outcome");
    }
}
