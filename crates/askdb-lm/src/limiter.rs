// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Token-bucket rate limiter for outbound LM calls.
//!
//! One bucket is shared process-wide and is fair across workers: waiters
//! queue on the internal mutex in arrival order. The bucket holds at most
//! `rate_per_minute` tokens, so a cold process can burst one minute's worth
//! of calls before smoothing kicks in.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Suspending token bucket.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(rate_per_minute: u32) -> Self {
        let capacity = f64::from(rate_per_minute.max(1));
        Self {
            capacity,
            refill_per_sec: capacity / 60.0,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes one token, suspending until one accrues. Fails when the wait
    /// would exceed `deadline`.
    pub async fn acquire(&self, deadline: Duration) -> Result<(), Duration> {
        let started = Instant::now();
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return Ok(());
                }
                // Seconds until the next whole token accrues.
                Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
            };

            if started.elapsed() + wait > deadline {
                return Err(wait);
            }
            tokio::time::sleep(wait).await;
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_up_to_capacity_is_immediate() {
        let bucket = TokenBucket::new(3);
        for _ in 0..3 {
            bucket.acquire(Duration::from_millis(1)).await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_bucket_fails_fast_past_deadline() {
        let bucket = TokenBucket::new(1);
        bucket.acquire(Duration::from_millis(1)).await.unwrap();
        // Refill is 1/min; a 1 ms deadline cannot cover the wait.
        let err = bucket.acquire(Duration::from_millis(1)).await;
        assert!(err.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_accrue_over_time() {
        let bucket = TokenBucket::new(60); // 1 token per second
        for _ in 0..60 {
            bucket.acquire(Duration::from_millis(1)).await.unwrap();
        }
        // Bucket is dry; a generous deadline suspends until the next token.
        let before = Instant::now();
        bucket.acquire(Duration::from_secs(5)).await.unwrap();
        assert!(before.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test(start_paused = true)]
    async fn refill_caps_at_capacity() {
        let bucket = TokenBucket::new(2);
        tokio::time::advance(Duration::from_secs(600)).await;
        bucket.acquire(Duration::from_millis(1)).await.unwrap();
        bucket.acquire(Duration::from_millis(1)).await.unwrap();
        assert!(bucket.acquire(Duration::from_millis(1)).await.is_err());
    }
}
