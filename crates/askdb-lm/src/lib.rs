// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Language-model client: rate limiting, circuit breaking, retries,
//! response caching, and the HTTP chat-completion transport.

pub mod breaker;
pub mod client;
pub mod limiter;
pub mod parse;
pub mod transport;

pub use breaker::CircuitBreaker;
pub use client::LmClient;
pub use limiter::TokenBucket;
pub use transport::{ChatTransport, HttpTransport, TransportError, TransportErrorKind};
