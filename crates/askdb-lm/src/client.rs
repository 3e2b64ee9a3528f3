// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The process-wide LM coordinator.
//!
//! [`LmClient`] is the only place in the core with long-lived mutable state:
//! it owns the token bucket and the circuit breaker, and layers the response
//! cache, transient retries, and the per-call deadline around the raw
//! transport. Collaborators receive it by `Arc` through the [`LmProvider`]
//! trait; nothing reaches the transport directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use askdb_cache::{keys, ns, Cache};
use askdb_config::model::LmConfig;
use askdb_core::{AskdbError, CompletionRequest, LmProvider};

use crate::breaker::CircuitBreaker;
use crate::limiter::TokenBucket;
use crate::parse;
use crate::transport::{ChatTransport, HttpTransport, TransportError};

const BACKOFF_BASE: Duration = Duration::from_millis(500);
const BACKOFF_CAP: Duration = Duration::from_secs(8);

/// Rate-limited, circuit-broken, retrying, caching LM client.
pub struct LmClient {
    transport: Arc<dyn ChatTransport>,
    cache: Cache,
    model: String,
    limiter: TokenBucket,
    breaker: CircuitBreaker,
    max_attempts: u32,
    request_timeout: Duration,
    cache_enabled: bool,
    cache_ttl: Duration,
}

impl LmClient {
    /// Builds the client around an arbitrary transport. Tests inject mock
    /// transports here.
    pub fn new(config: &LmConfig, transport: Arc<dyn ChatTransport>, cache: Cache) -> Self {
        Self {
            transport,
            cache,
            model: config.model.clone(),
            limiter: TokenBucket::new(config.rate_limit_per_minute),
            breaker: CircuitBreaker::new(config.failure_threshold, config.cooldown()),
            max_attempts: config.max_retries.max(1),
            request_timeout: config.request_timeout(),
            cache_enabled: config.cache_enabled,
            cache_ttl: config.cache_ttl(),
        }
    }

    /// Builds the client with the HTTP transport from configuration.
    pub fn from_config(config: &LmConfig, cache: Cache) -> Result<Self, AskdbError> {
        let transport = HttpTransport::new(
            &config.api_base,
            config.auth_header.as_deref(),
            config.request_timeout(),
        )
        .map_err(|e| AskdbError::Config(e.to_string()))?;
        Ok(Self::new(config, Arc::new(transport), cache))
    }

    /// The configured model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// True while the breaker would fail calls fast.
    pub fn circuit_open(&self) -> bool {
        self.breaker.is_open()
    }

    /// Sends a completion, returning the raw response text.
    ///
    /// Only temperature-0.0 responses are cached: they are the deterministic
    /// ones, and the cache key includes every input that determines the
    /// output.
    pub async fn complete_text(&self, request: &CompletionRequest) -> Result<String, AskdbError> {
        let cacheable = self.cache_enabled && request.temperature == 0.0;
        let key = keys::lm_response_key(
            request.system_prompt.as_deref(),
            &request.user_prompt,
            request.temperature,
            &self.model,
        );

        if cacheable {
            if let Some(bytes) = self.cache.get(ns::LM_RESPONSE, &key).await {
                debug!("lm response served from cache");
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
        }

        let mut backoff = BACKOFF_BASE;
        let mut last_error: Option<TransportError> = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                warn!(attempt, "retrying LM call after transient failure");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(BACKOFF_CAP);
            }

            if !self.breaker.try_acquire() {
                return Err(AskdbError::CircuitOpen);
            }

            if self.limiter.acquire(self.request_timeout).await.is_err() {
                self.breaker.on_abandoned();
                return Err(AskdbError::Timeout {
                    duration: self.request_timeout,
                });
            }

            let started = std::time::Instant::now();
            let outcome =
                tokio::time::timeout(self.request_timeout, self.transport.send(request, &self.model))
                    .await;
            askdb_prometheus::record_lm_latency(started.elapsed().as_secs_f64());

            match outcome {
                Ok(Ok(text)) => {
                    self.breaker.on_success();
                    askdb_prometheus::record_lm_call("ok");
                    if cacheable {
                        self.cache
                            .put(ns::LM_RESPONSE, &key, text.as_bytes(), self.cache_ttl)
                            .await;
                    }
                    return Ok(text);
                }
                Ok(Err(e)) if e.is_transient() => {
                    self.breaker.on_failure();
                    askdb_prometheus::record_lm_call("error");
                    warn!(error = %e, "transient LM failure");
                    last_error = Some(e);
                }
                Ok(Err(e)) => {
                    // The endpoint answered; the dependency itself is healthy.
                    self.breaker.on_success();
                    askdb_prometheus::record_lm_call("error");
                    return Err(AskdbError::Provider {
                        message: e.to_string(),
                        source: Some(Box::new(e)),
                    });
                }
                Err(_) => {
                    self.breaker.on_failure();
                    askdb_prometheus::record_lm_call("timeout");
                    warn!(timeout = ?self.request_timeout, "LM call hard-cancelled at deadline");
                    last_error = Some(TransportError::new(
                        crate::transport::TransportErrorKind::Timeout,
                        format!("call exceeded {:?}", self.request_timeout),
                    ));
                }
            }
        }

        let detail = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt was made".to_string());
        Err(AskdbError::Provider {
            message: format!(
                "LM call failed after {} attempts: {detail}",
                self.max_attempts
            ),
            source: None,
        })
    }

    /// Sends a completion and parses the response as JSON, tolerating code
    /// fences and surrounding prose. Parse failures do not retry.
    pub async fn complete_json(
        &self,
        request: &CompletionRequest,
    ) -> Result<serde_json::Value, AskdbError> {
        let text = self.complete_text(request).await?;
        parse::extract_json(&text).ok_or_else(|| AskdbError::Provider {
            message: format!(
                "response carried no parseable JSON: {}",
                text.chars().take(120).collect::<String>()
            ),
            source: None,
        })
    }
}

#[async_trait]
impl LmProvider for LmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AskdbError> {
        self.complete_text(request).await
    }
}
