// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key and channel names for the shared store schema (§6.3). Centralized so
//! every crate that touches the store agrees on the exact shape.

pub const PENDING_SET: &str = "jobs:pending";
pub const FAILED_JOBS_HASH: &str = "jobs:failed";

pub fn job_key(job_id: &str) -> String {
    format!("job:{job_id}")
}

pub fn job_scan_pattern() -> &'static str {
    "job:*"
}

pub fn active_jobs_hash(worker_id: &str) -> String {
    format!("jobs:active:{worker_id}")
}

pub fn worker_key(worker_id: &str) -> String {
    format!("worker:{worker_id}")
}

pub fn worker_heartbeat_key(worker_id: &str) -> String {
    format!("worker:{worker_id}:heartbeat")
}

pub fn worker_heartbeat_scan_pattern() -> &'static str {
    "worker:*:heartbeat"
}

pub fn worker_jobs_hash(worker_id: &str) -> String {
    format!("worker:{worker_id}:jobs")
}

pub fn worker_status_hash(worker_id: &str) -> String {
    format!("worker:{worker_id}:status")
}

pub fn machine_info_key(machine_id: &str) -> String {
    format!("machine:{machine_id}:info")
}

pub fn machine_scan_pattern() -> &'static str {
    "machine:*:info"
}

/// Extracts the worker id embedded in a heartbeat key produced by
/// [`worker_heartbeat_key`], e.g. `worker:w-1:heartbeat` -> `w-1`.
pub fn worker_id_from_heartbeat_key(key: &str) -> Option<&str> {
    key.strip_prefix("worker:")?.strip_suffix(":heartbeat")
}

/// Extracts the machine id embedded in an info key produced by
/// [`machine_info_key`], e.g. `machine:m-1:info` -> `m-1`.
pub fn machine_id_from_info_key(key: &str) -> Option<&str> {
    key.strip_prefix("machine:")?.strip_suffix(":info")
}

/// Extracts the job id embedded in a job key produced by [`job_key`].
pub fn job_id_from_key(key: &str) -> Option<&str> {
    key.strip_prefix("job:")
}

pub mod channels {
    pub const UPDATE_JOB_PROGRESS: &str = "update_job_progress";
    pub const WORKER_STATUS: &str = "worker_status";
    pub const COMPLETE_JOB: &str = "complete_job";
    pub const CANCEL_JOB: &str = "cancel_job";
    pub const MACHINE_STARTUP_EVENTS: &str = "machine:startup:events";
    pub const WORKER_EVENTS: &str = "worker:events";
    pub const CONNECTOR_STATUS_PATTERN: &str = "connector_status:*";
    pub const LEGACY_WORKER_STARTUP_EVENTS: &str = "worker:startup:events";
    pub const KEYSPACE_JOB_PATTERN: &str = "__keyspace@0__:job:*";
    pub const KEYSPACE_WORKER_PATTERN: &str = "__keyspace@0__:worker:*";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_key_round_trips_worker_id() {
        let key = worker_heartbeat_key("w-7");
        assert_eq!(worker_id_from_heartbeat_key(&key), Some("w-7"));
    }

    #[test]
    fn machine_info_key_round_trips_machine_id() {
        let key = machine_info_key("m-3");
        assert_eq!(machine_id_from_info_key(&key), Some("m-3"));
    }

    #[test]
    fn job_key_round_trips_job_id() {
        let key = job_key("job-abc");
        assert_eq!(job_id_from_key(&key), Some("job-abc"));
    }
}
