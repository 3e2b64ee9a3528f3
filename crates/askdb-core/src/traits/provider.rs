// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Language-model provider trait.

use async_trait::async_trait;

use crate::error::AskdbError;
use crate::types::CompletionRequest;

/// Boundary to a chat-completion endpoint.
///
/// The production implementation layers rate limiting, circuit breaking,
/// retries, caching, and deadlines on top of the raw HTTP transport; the
/// pipeline only sees this trait. The response body is opaque text; each
/// pipeline stage performs its own structured parsing.
#[async_trait]
pub trait LmProvider: Send + Sync {
    /// Sends a completion request and returns the response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, AskdbError>;
}
