// SPDX-FileCopyrightText: 2026 Askdb Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Key-addressed storage for job results, a thin facade over the cache.
//!
//! Records are readable while the job is still running. Terminal records
//! are written exactly once by the owning worker; their TTL counts from the
//! terminal write because every write restarts the entry's TTL.

use std::time::Duration;

use askdb_cache::{ns, Cache};
use askdb_core::{JobId, ResultRecord};

#[derive(Clone)]
pub struct ResultStore {
    cache: Cache,
    ttl: Duration,
}

impl ResultStore {
    pub fn new(cache: Cache, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    pub async fn write(&self, job_id: &JobId, record: &ResultRecord) {
        self.cache
            .put_json(ns::RESULT, &job_id.0, record, self.ttl)
            .await;
    }

    /// `None` when the id never existed or its record expired.
    pub async fn read(&self, job_id: &JobId) -> Option<ResultRecord> {
        self.cache.get_json(ns::RESULT, &job_id.0).await
    }

    /// Drops a record outright. Used when a submission is rejected after
    /// its Pending record was written.
    pub async fn remove(&self, job_id: &JobId) {
        self.cache.invalidate(ns::RESULT, &job_id.0).await;
    }
}
