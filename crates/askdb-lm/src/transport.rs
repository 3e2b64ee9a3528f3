// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP transport for the chat-completion endpoint.
//!
//! Speaks the OpenAI-compatible `/v1/chat/completions` wire shape that the
//! upstream proxy exposes. The transport is deliberately dumb: one request,
//! one response, classified errors. Rate limiting, circuit breaking, retry,
//! and caching live in [`crate::LmClient`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use askdb_core::types::CompletionRequest;

/// Classified transport failure.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Connection-level failure before a status was received.
    Network,
    /// The request exceeded its deadline.
    Timeout,
    /// The endpoint answered with this HTTP status.
    Http(u16),
    /// The body could not be decoded into a completion.
    Parse,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Network failures, timeouts, 429s, and 5xx are worth retrying;
    /// other 4xx and parse failures are not.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            TransportErrorKind::Network | TransportErrorKind::Timeout => true,
            TransportErrorKind::Http(status) => status == 429 || status >= 500,
            TransportErrorKind::Parse => false,
        }
    }
}

/// One outbound chat-completion call.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(
        &self,
        request: &CompletionRequest,
        model: &str,
    ) -> Result<String, TransportError>;
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

/// reqwest-backed [`ChatTransport`].
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Builds the transport with the configured auth header and per-request
    /// deadline baked into the client.
    pub fn new(
        api_base: &str,
        auth_header: Option<&str>,
        request_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        if let Some(auth) = auth_header {
            headers.insert(
                "authorization",
                HeaderValue::from_str(auth).map_err(|e| {
                    TransportError::new(
                        TransportErrorKind::Parse,
                        format!("invalid auth header value: {e}"),
                    )
                })?,
            );
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                TransportError::new(
                    TransportErrorKind::Network,
                    format!("failed to build HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", api_base.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(
        &self,
        request: &CompletionRequest,
        model: &str,
    ) -> Result<String, TransportError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system_prompt {
            messages.push(WireMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: &request.user_prompt,
        });

        let body = WireRequest {
            model,
            messages,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() {
                    TransportErrorKind::Timeout
                } else {
                    TransportErrorKind::Network
                };
                TransportError::new(kind, format!("HTTP request failed: {e}"))
            })?;

        let status = response.status();
        debug!(status = %status, "completion response received");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::new(
                TransportErrorKind::Http(status.as_u16()),
                format!("endpoint returned {status}: {body}"),
            ));
        }

        let body = response.text().await.map_err(|e| {
            TransportError::new(
                TransportErrorKind::Network,
                format!("failed to read response body: {e}"),
            )
        })?;
        let parsed: WireResponse = serde_json::from_str(&body).map_err(|e| {
            TransportError::new(
                TransportErrorKind::Parse,
                format!("failed to parse completion response: {e}"),
            )
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                TransportError::new(TransportErrorKind::Parse, "response carried no choices")
            })
    }
}
