// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Job types flowing through the dispatcher.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use askdb_core::{JobId, SessionId};

/// Worker pools, differing only in time limits and size.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PoolTier {
    Simple,
    Standard,
    Complex,
}

/// One submitted unit of work. Owned by the queue until pickup, then
/// exclusively by one worker, then by the result store.
#[derive(Debug, Clone)]
pub struct QuestionJob {
    pub id: JobId,
    pub question: String,
    pub session_id: Option<SessionId>,
    pub tier: PoolTier,
    /// RFC 3339 submission timestamp.
    pub submitted_at: String,
    /// Zero-based run counter; bumped on each transient re-enqueue.
    pub attempt: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn tier_round_trips() {
        for tier in [PoolTier::Simple, PoolTier::Standard, PoolTier::Complex] {
            let parsed = PoolTier::from_str(&tier.to_string()).unwrap();
            assert_eq!(tier, parsed);
        }
        assert_eq!(PoolTier::Standard.to_string(), "standard");
    }
}
