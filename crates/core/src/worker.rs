// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker identifier and the record read back from the `worker:{id}` hash.
//!
//! Workers are an external collaborator (§3.2): this workspace only reads
//! and reconciles their state, never drives their internals.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hash_codec::{self, HashDecodeError};

crate::define_id! {
    /// Unique identifier for a worker instance.
    pub struct WorkerId;
}

/// Closed set of worker statuses (§3 clarification, resolving the Open
/// Question left in the originating specification's enumeration ambiguity).
/// Anything else is rejected at decode time rather than silently accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Offline,
    Error,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Busy => "busy",
            WorkerStatus::Offline => "offline",
            WorkerStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// The record read back from the `worker:{id}` hash (§3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub worker_id: WorkerId,
    pub status: WorkerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<WorkerStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<String>,
    #[serde(default)]
    pub total_jobs_completed: u64,
    #[serde(default)]
    pub total_jobs_failed: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector_statuses: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<String>,
}

impl Worker {
    /// Decodes a `worker:{id}` hash (§3.2, §6.3). Read-only here — this
    /// workspace never writes worker fields, only reads them back for
    /// reconciliation and snapshotting.
    pub fn from_hash(worker_id: &str, hash: &HashMap<String, String>) -> Result<Self, HashDecodeError> {
        Ok(Self {
            worker_id: WorkerId::new(worker_id.to_string()),
            status: hash_codec::require_enum(hash, "status")?,
            previous_status: hash_codec::opt_enum(hash, "previous_status")?,
            current_job_id: hash_codec::opt_string(hash, "current_job_id"),
            machine_id: hash_codec::opt_string(hash, "machine_id"),
            total_jobs_completed: hash_codec::opt_u64(hash, "total_jobs_completed")?.unwrap_or(0),
            total_jobs_failed: hash_codec::opt_u64(hash, "total_jobs_failed")?.unwrap_or(0),
            capabilities: hash_codec::opt_json(hash, "capabilities")?,
            connector_statuses: hash_codec::opt_json(hash, "connector_statuses")?,
            connected_at: hash_codec::opt_string(hash, "connected_at"),
            last_heartbeat: hash_codec::opt_string(hash, "last_heartbeat"),
        })
    }
}

/// Derives a worker's machine id from its id when the `machine_id` field
/// is absent from the hash (§4.H pattern extraction fallback).
///
/// Tried in order:
/// 1. `{prefix}-worker-{digits}` suffix -> prefix
/// 2. `redis-direct-worker-{prefix}-{digits}` suffix -> prefix
/// 3. otherwise `"unknown"`
pub fn extract_machine_id_from_worker_id(worker_id: &str) -> String {
    if let Some(prefix) = strip_worker_digits_suffix(worker_id, "-worker-") {
        return prefix;
    }
    if let Some(rest) = worker_id.strip_prefix("redis-direct-worker-") {
        if let Some(prefix) = strip_worker_digits_suffix(rest, "-") {
            return prefix;
        }
    }
    "unknown".to_string()
}

/// Strips a trailing `{sep}{digits}` from `s` using the *last* occurrence of
/// `sep`, returning the prefix before it, only if what follows is all ASCII
/// digits and non-empty.
fn strip_worker_digits_suffix(s: &str, sep: &str) -> Option<String> {
    let idx = s.rfind(sep)?;
    let prefix = &s[..idx];
    let suffix = &s[idx + sep.len()..];
    if prefix.is_empty() || suffix.is_empty() {
        return None;
    }
    if suffix.chars().all(|c| c.is_ascii_digit()) {
        Some(prefix.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_machine_id_from_standard_worker_pattern() {
        assert_eq!(
            extract_machine_id_from_worker_id("gpu-node-7-worker-3"),
            "gpu-node-7"
        );
    }

    #[test]
    fn extracts_machine_id_from_redis_direct_pattern() {
        assert_eq!(
            extract_machine_id_from_worker_id("redis-direct-worker-gpu-node-7-3"),
            "gpu-node-7"
        );
    }

    #[test]
    fn falls_back_to_unknown_when_no_pattern_matches() {
        assert_eq!(extract_machine_id_from_worker_id("bespoke-id"), "unknown");
    }

    #[test]
    fn worker_decodes_from_flat_hash_fields() {
        let mut hash = std::collections::HashMap::new();
        hash.insert("status".to_string(), "busy".to_string());
        hash.insert("current_job_id".to_string(), "job-1".to_string());
        hash.insert("machine_id".to_string(), "m-1".to_string());
        hash.insert("total_jobs_completed".to_string(), "3".to_string());

        let worker = Worker::from_hash("w-1", &hash).unwrap();
        assert_eq!(worker.status, WorkerStatus::Busy);
        assert_eq!(worker.current_job_id.as_deref(), Some("job-1"));
        assert_eq!(worker.total_jobs_completed, 3);
    }

    #[test]
    fn worker_status_round_trips_through_json() {
        let json = serde_json::to_string(&WorkerStatus::Busy).unwrap_or_default();
        assert_eq!(json, "\"busy\"");
        let back: WorkerStatus = serde_json::from_str(&json).unwrap_or(WorkerStatus::Error);
        assert_eq!(back, WorkerStatus::Busy);
    }
}
