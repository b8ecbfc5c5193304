// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Admin Reconciler (§4.H): cleanup, machine deletion, machine
//! lifecycle-event hash updates, and cancellation. Every operation here
//! propagates store failures to its caller (§7).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use jobmux_core::{
    extract_machine_id_from_worker_id, Clock, Event, Job, JobStatus, MachineStatus, ScoreInputs, Worker,
};
use jobmux_store::{keys, StoreAdapter};
use serde::Serialize;
use tracing::warn;

use crate::error::EngineError;
use crate::fanout::FanOutEngine;

#[derive(Debug, Clone, Default)]
pub struct CleanupOptions {
    pub reset_workers: bool,
    pub cleanup_orphaned_jobs: bool,
    pub reset_specific_worker: Option<String>,
    pub max_job_age_minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupResult {
    pub workers_reset: u32,
    pub jobs_cleaned: u32,
    pub workers_found: Vec<String>,
    pub details: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MachineDeletionResult {
    pub machine_id: String,
    pub workers_found: Vec<String>,
    pub workers_cleaned: u32,
    pub message: String,
}

pub struct AdminReconciler {
    store: Arc<dyn StoreAdapter>,
    fanout: Arc<FanOutEngine>,
    clock: Arc<dyn Clock>,
}

impl AdminReconciler {
    pub fn new(store: Arc<dyn StoreAdapter>, fanout: Arc<FanOutEngine>, clock: Arc<dyn Clock>) -> Self {
        Self { store, fanout, clock }
    }

    /// Cleanup operation (§4.H): worker reset and orphan sweep, independently
    /// gated by the flags in `options`.
    pub async fn cleanup(&self, options: CleanupOptions) -> Result<CleanupResult, EngineError> {
        let mut result = CleanupResult::default();

        let targets = self.resolve_reset_targets(&options).await?;
        for worker_id in &targets {
            let jobs_returned = self.reset_worker(worker_id).await?;
            result.workers_reset += 1;
            result.jobs_cleaned += jobs_returned;
            result.workers_found.push(worker_id.clone());
            result
                .details
                .push(format!("reset worker {worker_id}, returned {jobs_returned} job(s) to pending"));
        }

        if options.cleanup_orphaned_jobs {
            let max_age = options.max_job_age_minutes.unwrap_or(30);
            let swept = self.sweep_orphaned_jobs(max_age).await?;
            result.jobs_cleaned += swept;
            if swept > 0 {
                result.details.push(format!("swept {swept} orphaned job(s)"));
            }
        }

        Ok(result)
    }

    async fn resolve_reset_targets(&self, options: &CleanupOptions) -> Result<Vec<String>, EngineError> {
        if let Some(worker_id) = &options.reset_specific_worker {
            return Ok(vec![worker_id.clone()]);
        }
        if !options.reset_workers {
            return Ok(Vec::new());
        }
        let heartbeat_keys = self.scan_all(keys::worker_heartbeat_scan_pattern()).await?;
        Ok(heartbeat_keys
            .iter()
            .filter_map(|key| keys::worker_id_from_heartbeat_key(key).map(str::to_string))
            .collect())
    }

    /// Per §4.H "Worker reset": idles the worker and returns every job
    /// currently assigned to it back to pending. Returns the number of jobs
    /// returned.
    async fn reset_worker(&self, worker_id: &str) -> Result<u32, EngineError> {
        let now = self.clock.now().to_rfc3339();
        self.store
            .put_hash_fields(
                &keys::worker_key(worker_id),
                &[("status", "idle"), ("last_activity", now.as_str())],
            )
            .await?;
        self.store.delete_key(&keys::active_jobs_hash(worker_id)).await?;

        let jobs = self.jobs_assigned_to(worker_id).await?;
        let mut returned = 0u32;
        for mut job in jobs {
            if job.status.is_terminal() {
                continue;
            }
            self.return_job_to_pending(&mut job).await?;
            returned += 1;
        }
        Ok(returned)
    }

    /// Returns every job whose `worker_id` field names `worker_id`,
    /// regardless of status — the caller filters further as needed.
    async fn jobs_assigned_to(&self, worker_id: &str) -> Result<Vec<Job>, EngineError> {
        let job_keys = self.scan_all(keys::job_scan_pattern()).await?;
        let mut matches = Vec::new();
        for key in job_keys {
            let hash = self.store.get_hash(&key).await?;
            if hash.is_empty() {
                continue;
            }
            let Ok(job) = Job::from_hash(&hash) else {
                continue;
            };
            if job.worker_id.as_deref() == Some(worker_id) {
                matches.push(job);
            }
        }
        Ok(matches)
    }

    /// Resets `job` to pending, recomputes its score from its original
    /// priority and `created_at`, and re-adds it to the pending sorted set
    /// (§4.H, worker reset and orphan sweep share this step).
    async fn return_job_to_pending(&self, job: &mut Job) -> Result<(), EngineError> {
        job.reset_to_pending();
        let fields = job.to_hash_fields();
        let borrowed: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        self.store.put_hash_fields(&keys::job_key(job.id.as_str()), &borrowed).await?;

        let score_inputs = ScoreInputs {
            priority: job.priority,
            workflow_priority: job.workflow_priority,
            created_at_ms: parse_rfc3339_ms(&job.created_at).unwrap_or(0),
            workflow_datetime_ms: job.workflow_datetime,
        };
        let score = jobmux_core::score(&score_inputs);
        self.store
            .add_to_sorted_set(keys::PENDING_SET, job.id.as_str(), score)
            .await?;
        Ok(())
    }

    /// Orphan sweep (§4.H): jobs stuck in an active status whose most recent
    /// timestamp is older than `max_age_minutes` and whose worker has no
    /// live heartbeat key.
    async fn sweep_orphaned_jobs(&self, max_age_minutes: i64) -> Result<u32, EngineError> {
        let now_ms = self.clock.now_ms();
        let cutoff_ms = now_ms - max_age_minutes * 60_000;

        let job_keys = self.scan_all(keys::job_scan_pattern()).await?;
        let mut swept = 0u32;
        for key in job_keys {
            let hash = self.store.get_hash(&key).await?;
            if hash.is_empty() {
                continue;
            }
            let Ok(mut job) = Job::from_hash(&hash) else {
                continue;
            };
            if !matches!(job.status, JobStatus::Assigned | JobStatus::Accepted | JobStatus::InProgress) {
                continue;
            }
            let most_recent = job
                .started_at
                .as_deref()
                .or(job.assigned_at.as_deref())
                .and_then(parse_rfc3339_ms);
            let Some(most_recent_ms) = most_recent else {
                continue;
            };
            if most_recent_ms > cutoff_ms {
                continue;
            }
            let Some(worker_id) = &job.worker_id else {
                continue;
            };
            let has_heartbeat = self.store.ttl(&keys::worker_heartbeat_key(worker_id)).await?.is_some();
            if has_heartbeat {
                continue;
            }
            self.return_job_to_pending(&mut job).await?;
            swept += 1;
        }
        Ok(swept)
    }

    /// Machine deletion (§4.H).
    pub async fn delete_machine(&self, machine_id: &str) -> Result<MachineDeletionResult, EngineError> {
        let info_key = keys::machine_info_key(machine_id);
        let existing = self.store.get_hash(&info_key).await?;
        if existing.is_empty() {
            return Err(EngineError::NotFound(format!("machine {machine_id} not found")));
        }

        let heartbeat_keys = self.scan_all(keys::worker_heartbeat_scan_pattern()).await?;
        let mut workers_found = Vec::new();
        for heartbeat_key in heartbeat_keys {
            let Some(worker_id) = keys::worker_id_from_heartbeat_key(&heartbeat_key) else {
                continue;
            };
            let hash = self.store.get_hash(&keys::worker_key(worker_id)).await?;
            if hash.is_empty() {
                continue;
            }
            let Ok(worker) = Worker::from_hash(worker_id, &hash) else {
                continue;
            };
            let owning_machine = worker
                .machine_id
                .clone()
                .unwrap_or_else(|| extract_machine_id_from_worker_id(worker_id));
            if owning_machine == machine_id {
                workers_found.push(worker_id.to_string());
            }
        }

        for worker_id in &workers_found {
            self.cleanup_worker_for_deletion(worker_id).await?;
        }

        self.store.delete_key(&info_key).await?;

        let now_ms = self.clock.now_ms();
        self.fanout
            .dispatch(Event::MachineShutdown {
                machine_id: machine_id.to_string(),
                timestamp: now_ms,
                reason: "Machine deleted by user request".to_string(),
            })
            .await;

        let workers_cleaned = workers_found.len() as u32;
        Ok(MachineDeletionResult {
            machine_id: machine_id.to_string(),
            workers_found,
            workers_cleaned,
            message: format!("deleted machine {machine_id}, cleaned {workers_cleaned} worker(s)"),
        })
    }

    async fn cleanup_worker_for_deletion(&self, worker_id: &str) -> Result<(), EngineError> {
        for mut job in self.jobs_assigned_to(worker_id).await? {
            if !job.status.is_terminal() {
                self.return_job_to_pending(&mut job).await?;
            }
        }

        self.store.delete_key(&keys::worker_key(worker_id)).await?;
        self.store.delete_key(&keys::worker_heartbeat_key(worker_id)).await?;
        self.store.delete_key(&keys::worker_jobs_hash(worker_id)).await?;
        self.store.delete_key(&keys::worker_status_hash(worker_id)).await?;
        self.store.delete_key(&keys::active_jobs_hash(worker_id)).await?;

        let now_ms = self.clock.now_ms();
        self.fanout
            .dispatch(Event::WorkerDisconnected {
                worker_id: worker_id.to_string(),
                timestamp: now_ms,
                reason: Some("machine deleted".to_string()),
            })
            .await;
        Ok(())
    }

    /// Cancellation (§4.H). Disallowed once the job has reached a terminal
    /// completed/failed state.
    pub async fn cancel_job(&self, job_id: &str) -> Result<(), EngineError> {
        let hash = self.store.get_hash(&keys::job_key(job_id)).await?;
        if hash.is_empty() {
            return Err(EngineError::NotFound(format!("job {job_id} not found")));
        }
        let mut job = Job::from_hash(&hash)?;
        if matches!(job.status, JobStatus::Completed | JobStatus::Failed) {
            return Err(EngineError::BadRequest(format!(
                "job {job_id} cannot be cancelled from status {}",
                job.status
            )));
        }

        let was_pending = job.status.is_pending();
        let assigned_worker = job.worker_id.clone();
        job.cancel(&*self.clock);

        self.store
            .put_hash_fields(
                &keys::job_key(job_id),
                &[
                    ("status", job.status.to_string().as_str()),
                    ("error", job.error.as_deref().unwrap_or_default()),
                    ("failed_at", job.failed_at.as_deref().unwrap_or_default()),
                ],
            )
            .await?;

        if let Some(worker_id) = assigned_worker {
            let payload = serde_json::json!({"job_id": job_id, "worker_id": worker_id}).to_string();
            self.store.publish(keys::channels::CANCEL_JOB, &payload).await?;
        }
        if was_pending {
            self.store.remove_from_sorted_set(keys::PENDING_SET, job_id).await?;
        }

        let marker = serde_json::json!({"cancelled": true, "failed_at": job.failed_at}).to_string();
        self.store
            .put_hash_fields(keys::FAILED_JOBS_HASH, &[(job_id, marker.as_str())])
            .await?;

        self.fanout
            .dispatch(Event::JobFailed {
                job_id: job_id.to_string(),
                timestamp: self.clock.now_ms(),
                error: job.error.unwrap_or_default(),
                cancelled: true,
            })
            .await;

        Ok(())
    }

    /// Applies the hash-level state transition implied by a decoded machine
    /// lifecycle event (§4.H "update the machine hash atomically"). Called
    /// by the Event Bus before re-broadcasting the event to monitors.
    pub async fn apply_machine_event(&self, event: &Event) -> Result<(), EngineError> {
        let now = self.clock.now().to_rfc3339();
        match event {
            Event::MachineStartup { machine_id, .. } => {
                self.store
                    .put_hash_fields(
                        &keys::machine_info_key(machine_id),
                        &[("status", MachineStatus::Starting.to_string().as_str()), ("last_activity", now.as_str())],
                    )
                    .await?;
            }
            Event::MachineStartupComplete { machine_id, .. } => {
                self.store
                    .put_hash_fields(
                        &keys::machine_info_key(machine_id),
                        &[("status", MachineStatus::Ready.to_string().as_str()), ("last_activity", now.as_str())],
                    )
                    .await?;
            }
            Event::MachineShutdown { machine_id, .. } => {
                self.store
                    .put_hash_fields(
                        &keys::machine_info_key(machine_id),
                        &[("status", MachineStatus::Offline.to_string().as_str()), ("last_activity", now.as_str())],
                    )
                    .await?;
            }
            Event::MachineStartupStep { .. } => {
                // Step events carry no status transition of their own; the
                // classification into a bucket already happened in decode.
            }
            other => {
                warn!(event = ?other, "apply_machine_event called with a non-machine event");
            }
        }
        Ok(())
    }

    async fn scan_all(&self, pattern: &str) -> Result<Vec<String>, EngineError> {
        let mut cursor = 0u64;
        let mut keys = Vec::new();
        loop {
            let page = self.store.scan(cursor, pattern, 100).await?;
            keys.extend(page.keys);
            if page.cursor == 0 {
                break;
            }
            cursor = page.cursor;
        }
        Ok(keys)
    }
}

fn parse_rfc3339_ms(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobmux_core::FakeClock;
    use jobmux_registry::ConnectionRegistry;
    use jobmux_store::FakeStore;

    fn reconciler(store: FakeStore, clock: Arc<FakeClock>) -> AdminReconciler {
        let registry = Arc::new(ConnectionRegistry::new(None));
        let fanout = Arc::new(FanOutEngine::new(registry));
        AdminReconciler::new(Arc::new(store), fanout, clock)
    }

    async fn seed_assigned_job(store: &FakeStore, job_id: &str, worker_id: &str) {
        store
            .put_hash_fields(
                &keys::job_key(job_id),
                &[
                    ("id", job_id),
                    ("service_required", "render"),
                    ("priority", "50"),
                    ("created_at", "2026-01-01T00:00:00Z"),
                    ("status", "in_progress"),
                    ("worker_id", worker_id),
                    ("started_at", "2026-01-01T00:00:00Z"),
                ],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn worker_reset_returns_assigned_jobs_to_pending() {
        let store = FakeStore::new();
        seed_assigned_job(&store, "job-1", "w-1").await;
        store.put_hash_fields(&keys::worker_key("w-1"), &[("status", "busy")]).await.unwrap();

        let admin = reconciler(store.clone(), Arc::new(FakeClock::new()));
        let result = admin
            .cleanup(CleanupOptions {
                reset_specific_worker: Some("w-1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.workers_reset, 1);
        let worker_hash = store.get_hash(&keys::worker_key("w-1")).await.unwrap();
        assert_eq!(worker_hash.get("status").map(String::as_str), Some("idle"));

        let job_hash = store.get_hash(&keys::job_key("job-1")).await.unwrap();
        let job = Job::from_hash(&job_hash).unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let pending = store.range_by_score(keys::PENDING_SET, i64::MIN, i64::MAX, true, None).await.unwrap();
        assert_eq!(pending, vec!["job-1".to_string()]);
    }

    #[tokio::test]
    async fn orphan_sweep_only_moves_jobs_whose_worker_has_no_heartbeat() {
        let store = FakeStore::new();
        let clock = Arc::new(FakeClock::at_millis(2 * 60 * 60 * 1000));
        seed_assigned_job(&store, "job-1", "w-gone").await;

        let admin = reconciler(store.clone(), Arc::clone(&clock) as Arc<dyn Clock>);
        let result = admin
            .cleanup(CleanupOptions {
                cleanup_orphaned_jobs: true,
                max_job_age_minutes: Some(30),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(result.jobs_cleaned, 1);
    }

    #[tokio::test]
    async fn cancel_job_fails_from_pending_and_updates_failed_index() {
        let store = FakeStore::new();
        store
            .put_hash_fields(
                &keys::job_key("job-1"),
                &[
                    ("id", "job-1"),
                    ("service_required", "render"),
                    ("priority", "50"),
                    ("created_at", "2026-01-01T00:00:00Z"),
                    ("status", "pending"),
                ],
            )
            .await
            .unwrap();
        store.add_to_sorted_set(keys::PENDING_SET, "job-1", 1).await.unwrap();

        let admin = reconciler(store.clone(), Arc::new(FakeClock::new()));
        admin.cancel_job("job-1").await.unwrap();

        let hash = store.get_hash(&keys::job_key("job-1")).await.unwrap();
        let job = Job::from_hash(&hash).unwrap();
        assert_eq!(job.status, JobStatus::Failed);

        let pending = store.range_by_score(keys::PENDING_SET, i64::MIN, i64::MAX, true, None).await.unwrap();
        assert!(pending.is_empty());

        let failed_index = store.get_hash(keys::FAILED_JOBS_HASH).await.unwrap();
        assert!(failed_index.contains_key("job-1"));
    }

    #[tokio::test]
    async fn cancel_job_rejects_already_completed() {
        let store = FakeStore::new();
        store
            .put_hash_fields(
                &keys::job_key("job-1"),
                &[
                    ("id", "job-1"),
                    ("service_required", "render"),
                    ("priority", "50"),
                    ("created_at", "2026-01-01T00:00:00Z"),
                    ("status", "completed"),
                ],
            )
            .await
            .unwrap();

        let admin = reconciler(store, Arc::new(FakeClock::new()));
        let err = admin.cancel_job("job-1").await.unwrap_err();
        assert!(matches!(err, EngineError::BadRequest(_)));
    }

    #[tokio::test]
    async fn delete_machine_is_not_found_on_second_call() {
        let store = FakeStore::new();
        store.put_hash_fields(&keys::machine_info_key("m-1"), &[("status", "ready")]).await.unwrap();

        let admin = reconciler(store, Arc::new(FakeClock::new()));
        admin.delete_machine("m-1").await.unwrap();
        let err = admin.delete_machine("m-1").await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
