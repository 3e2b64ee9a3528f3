// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Boundary traits consumed by the query-processing core.

pub mod cache;
pub mod connector;
pub mod provider;

pub use cache::CacheStore;
pub use connector::SqlConnector;
pub use provider::LmProvider;
