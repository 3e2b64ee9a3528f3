// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared test doubles: scripted LM, scripted connector, in-memory cache.
//!
//! These enable fast, CI-runnable tests of the pipeline and dispatcher
//! without external services.

pub mod memory_cache;
pub mod mock_connector;
pub mod mock_lm;

pub use memory_cache::MemoryCache;
pub use mock_connector::{column, count_table, MockConnector};
pub use mock_lm::{MockLm, Reply};
