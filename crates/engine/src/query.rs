// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job Query (§6.1 `GET /api/jobs`, `GET /api/jobs/:id`): the read side of
//! the job store, built on the same scan-then-pipeline shape the Snapshot
//! Builder uses rather than a fresh access pattern.

use std::sync::Arc;

use jobmux_core::Job;
use jobmux_store::{keys, StoreAdapter, StoreOp, StoreValue};

use crate::error::EngineError;

const SCAN_BATCH_SIZE: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct JobListOptions {
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

pub struct JobQuery {
    store: Arc<dyn StoreAdapter>,
}

impl JobQuery {
    pub fn new(store: Arc<dyn StoreAdapter>) -> Self {
        Self { store }
    }

    pub async fn get(&self, job_id: &str) -> Result<Job, EngineError> {
        let hash = self.store.get_hash(&keys::job_key(job_id)).await?;
        if hash.is_empty() {
            return Err(EngineError::NotFound(format!("job {job_id} not found")));
        }
        Ok(Job::from_hash(&hash)?)
    }

    /// Lists jobs matching `options`, newest-key-first is not guaranteed —
    /// ordering comes from the SCAN cursor, not a stable sort on any job
    /// field. Filtering and pagination happen after the full key set is
    /// fetched, matching the bound already accepted for the Snapshot
    /// Builder's own scan (§4.F).
    pub async fn list(&self, options: JobListOptions) -> Result<Vec<Job>, EngineError> {
        let job_keys = self.scan_all(keys::job_scan_pattern()).await?;

        let ops: Vec<StoreOp> = job_keys.iter().map(|k| StoreOp::GetHash(k.clone())).collect();
        let mut jobs = Vec::new();
        if !ops.is_empty() {
            let results = self.store.pipeline(&ops).await?;
            for result in results {
                let Ok(StoreValue::Hash(hash)) = result else {
                    continue;
                };
                if hash.is_empty() {
                    continue;
                }
                let Ok(job) = Job::from_hash(&hash) else {
                    continue;
                };
                if let Some(status) = &options.status {
                    if job.status.to_string() != *status {
                        continue;
                    }
                }
                jobs.push(job);
            }
        }

        let offset = options.offset.unwrap_or(0);
        let jobs = jobs.into_iter().skip(offset);
        Ok(match options.limit {
            Some(limit) => jobs.take(limit).collect(),
            None => jobs.collect(),
        })
    }

    async fn scan_all(&self, pattern: &str) -> Result<Vec<String>, EngineError> {
        let mut cursor = 0u64;
        let mut keys = Vec::new();
        loop {
            let page = self.store.scan(cursor, pattern, SCAN_BATCH_SIZE).await?;
            keys.extend(page.keys);
            if page.cursor == 0 {
                break;
            }
            cursor = page.cursor;
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobmux_store::FakeStore;

    #[tokio::test]
    async fn get_returns_not_found_for_missing_job() {
        let store = FakeStore::new();
        let query = JobQuery::new(Arc::new(store));
        let err = query.get("job-1").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_filters_by_status_and_paginates() {
        let store = FakeStore::new();
        for (id, status) in [("job-1", "pending"), ("job-2", "completed"), ("job-3", "pending")] {
            store
                .put_hash_fields(
                    &keys::job_key(id),
                    &[
                        ("id", id),
                        ("service_required", "render"),
                        ("priority", "50"),
                        ("created_at", "2026-01-01T00:00:00Z"),
                        ("status", status),
                    ],
                )
                .await
                .unwrap();
        }
        let query = JobQuery::new(Arc::new(store));

        let pending = query
            .list(JobListOptions {
                status: Some("pending".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(pending.len(), 2);

        let page = query
            .list(JobListOptions {
                status: Some("pending".to_string()),
                limit: Some(1),
                offset: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
    }
}
