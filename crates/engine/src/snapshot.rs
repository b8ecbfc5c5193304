// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Snapshot Builder (§4.F): assembles the consolidated view handed to a
//! monitor on attach. Reads are pipelined and cursor-scanned; the result is
//! a single consistent-as-of-point-in-time frame, not a linearization point
//! (delta events may outrace it to the monitor).

use std::collections::HashSet;
use std::sync::Arc;

use jobmux_core::{Clock, Job, JobStatus, Machine, MachineStatus, Worker};
use jobmux_store::{keys, StoreAdapter, StoreOp, StoreValue};
use serde::Serialize;

use crate::error::EngineError;

const SCAN_BATCH_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    pub worker_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    pub total_jobs_completed: u64,
    pub total_jobs_failed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat_ttl: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JobBuckets {
    pub pending: Vec<Job>,
    pub active: Vec<Job>,
    pub completed: Vec<Job>,
    pub failed: Vec<Job>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MachineSnapshot {
    pub machine_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u32>,
}

/// Aggregate counts derived from the same scan this snapshot's `workers`,
/// `jobs`, and `machines` buckets come from — the fourth key §6.1 requires
/// alongside them in the `full_state_snapshot` frame.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemStats {
    pub total_workers: usize,
    pub total_machines: usize,
    pub pending_jobs: usize,
    pub active_jobs: usize,
    pub completed_jobs: usize,
    pub failed_jobs: usize,
    pub queue_depth: usize,
}

impl SystemStats {
    fn compute(workers: &[WorkerSnapshot], jobs: &JobBuckets, machines: &[MachineSnapshot]) -> Self {
        Self {
            total_workers: workers.len(),
            total_machines: machines.len(),
            pending_jobs: jobs.pending.len(),
            active_jobs: jobs.active.len(),
            completed_jobs: jobs.completed.len(),
            failed_jobs: jobs.failed.len(),
            queue_depth: jobs.pending.len() + jobs.active.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub workers: Vec<WorkerSnapshot>,
    pub jobs: JobBuckets,
    pub machines: Vec<MachineSnapshot>,
    pub system_stats: SystemStats,
}

/// Bucket for a job status, per §4.F's partition rule.
fn bucket_for(status: JobStatus) -> fn(&mut JobBuckets) -> &mut Vec<Job> {
    match status {
        JobStatus::Pending | JobStatus::Queued => |b| &mut b.pending,
        JobStatus::Assigned | JobStatus::Accepted | JobStatus::InProgress => |b| &mut b.active,
        JobStatus::Completed => |b| &mut b.completed,
        JobStatus::Failed | JobStatus::Cancelled | JobStatus::Timeout | JobStatus::Unworkable => {
            |b| &mut b.failed
        }
    }
}

pub struct SnapshotBuilder {
    store: Arc<dyn StoreAdapter>,
    clock: Arc<dyn Clock>,
}

impl SnapshotBuilder {
    pub fn new(store: Arc<dyn StoreAdapter>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn build(&self) -> Result<Snapshot, EngineError> {
        let worker_ids = self.scan_all(keys::worker_heartbeat_scan_pattern()).await?;
        let workers = self.fetch_workers(&worker_ids).await?;

        let job_keys = self.scan_all(keys::job_scan_pattern()).await?;
        let jobs = self.fetch_jobs(&job_keys).await?;

        let machine_keys = self.scan_all(keys::machine_scan_pattern()).await?;
        let live_machine_ids: HashSet<String> = workers
            .iter()
            .filter_map(|w| w.machine_id.clone())
            .collect();
        let machines = self.fetch_machines(&machine_keys, &live_machine_ids).await?;

        let system_stats = SystemStats::compute(&workers, &jobs, &machines);
        Ok(Snapshot { workers, jobs, machines, system_stats })
    }

    /// Cursor-scans `pattern` to exhaustion in batches of [`SCAN_BATCH_SIZE`].
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

    async fn fetch_workers(&self, heartbeat_keys: &[String]) -> Result<Vec<WorkerSnapshot>, EngineError> {
        let mut workers = Vec::with_capacity(heartbeat_keys.len());
        for heartbeat_key in heartbeat_keys {
            let Some(worker_id) = keys::worker_id_from_heartbeat_key(heartbeat_key) else {
                continue;
            };
            let ops = [
                StoreOp::GetHash(keys::worker_key(worker_id)),
                StoreOp::Ttl(heartbeat_key.clone()),
            ];
            let mut results = self.store.pipeline(&ops).await?;
            let (Some(ttl_result), Some(hash_result)) = (results.pop(), results.pop()) else {
                continue;
            };

            let Ok(StoreValue::Hash(hash)) = hash_result else {
                continue;
            };
            if hash.is_empty() {
                continue;
            }
            let Ok(worker) = Worker::from_hash(worker_id, &hash) else {
                continue;
            };
            let last_heartbeat_ttl = match ttl_result {
                Ok(StoreValue::Ttl(ttl)) => ttl,
                _ => None,
            };

            workers.push(WorkerSnapshot {
                worker_id: worker.worker_id.as_str().to_string(),
                status: worker.status.to_string(),
                current_job_id: worker.current_job_id,
                machine_id: worker.machine_id,
                total_jobs_completed: worker.total_jobs_completed,
                total_jobs_failed: worker.total_jobs_failed,
                capabilities: worker.capabilities,
                last_heartbeat_ttl,
            });
        }
        Ok(workers)
    }

    async fn fetch_jobs(&self, job_keys: &[String]) -> Result<JobBuckets, EngineError> {
        let mut buckets = JobBuckets::default();
        let ops: Vec<StoreOp> = job_keys.iter().map(|k| StoreOp::GetHash(k.clone())).collect();
        if ops.is_empty() {
            return Ok(buckets);
        }
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
            let status = job.status;
            bucket_for(status)(&mut buckets).push(job);
        }
        Ok(buckets)
    }

    async fn fetch_machines(
        &self,
        machine_keys: &[String],
        live_machine_ids: &HashSet<String>,
    ) -> Result<Vec<MachineSnapshot>, EngineError> {
        let mut machines = Vec::with_capacity(machine_keys.len());
        for info_key in machine_keys {
            let Some(machine_id) = keys::machine_id_from_info_key(info_key) else {
                continue;
            };
            let hash = self.store.get_hash(info_key).await?;
            if hash.is_empty() {
                continue;
            }
            let Ok(mut machine) = Machine::from_hash(machine_id, &hash) else {
                continue;
            };

            let has_live_worker = live_machine_ids.contains(machine_id);
            let corrected_status = if !has_live_worker {
                MachineStatus::Offline
            } else if machine.status == MachineStatus::Starting {
                MachineStatus::Starting
            } else {
                MachineStatus::Ready
            };

            if corrected_status != machine.status {
                let now = self.clock.now().to_rfc3339();
                self.store
                    .put_hash_fields(
                        info_key,
                        &Machine::status_hash_fields(corrected_status, &now)
                            .iter()
                            .map(|(k, v)| (k.as_str(), v.as_str()))
                            .collect::<Vec<_>>(),
                    )
                    .await?;
                machine.status = corrected_status;
            }

            machines.push(MachineSnapshot {
                machine_id: machine.machine_id.as_str().to_string(),
                status: machine.status.to_string(),
                hostname: machine.hostname,
                cpu_cores: machine.cpu_cores,
            });
        }
        Ok(machines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobmux_core::FakeClock;
    use jobmux_store::FakeStore;

    async fn store_with_worker_and_job() -> FakeStore {
        let store = FakeStore::new();
        store.set_presence_with_ttl("worker:w-1:heartbeat", 30);
        store
            .put_hash_fields("worker:w-1", &[("status", "idle"), ("machine_id", "m-1")])
            .await
            .unwrap();
        store
            .put_hash_fields(
                "job:job-1",
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
        store
    }

    #[tokio::test]
    async fn builds_workers_and_jobs_from_scanned_keys() {
        let store = store_with_worker_and_job().await;
        let builder = SnapshotBuilder::new(Arc::new(store), Arc::new(FakeClock::new()));
        let snapshot = builder.build().await.unwrap();

        assert_eq!(snapshot.workers.len(), 1);
        assert_eq!(snapshot.workers[0].worker_id, "w-1");
        assert_eq!(snapshot.jobs.pending.len(), 1);
        assert!(snapshot.jobs.active.is_empty());
    }

    #[tokio::test]
    async fn machine_without_live_worker_is_marked_offline() {
        let store = FakeStore::new();
        store
            .put_hash_fields("machine:m-1:info", &[("status", "ready")])
            .await
            .unwrap();

        let builder = SnapshotBuilder::new(Arc::new(store.clone()), Arc::new(FakeClock::new()));
        let snapshot = builder.build().await.unwrap();

        assert_eq!(snapshot.machines.len(), 1);
        assert_eq!(snapshot.machines[0].status, "offline");

        let persisted = store.get_hash("machine:m-1:info").await.unwrap();
        assert_eq!(persisted.get("status").map(String::as_str), Some("offline"));
    }

    #[tokio::test]
    async fn machine_with_live_worker_is_marked_ready() {
        let store = store_with_worker_and_job().await;
        store
            .put_hash_fields("machine:m-1:info", &[("status", "starting")])
            .await
            .unwrap();

        let builder = SnapshotBuilder::new(Arc::new(store), Arc::new(FakeClock::new()));
        let snapshot = builder.build().await.unwrap();

        assert_eq!(snapshot.machines[0].status, "starting");
    }
}
