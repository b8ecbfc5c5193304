// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The typed event taxonomy that the Event Bus normalizes onto and the
//! Fan-Out Engine routes (§3.5).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One of the fourteen wire-level event kinds this workspace knows how to
/// produce and route. Every variant carries `timestamp` (milliseconds) via
/// the enclosing envelope, plus a type-specific payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "job_submitted")]
    JobSubmitted {
        job_id: String,
        timestamp: i64,
        service_required: String,
        source: String,
    },
    #[serde(rename = "job_assigned")]
    JobAssigned {
        job_id: String,
        timestamp: i64,
        worker_id: String,
    },
    #[serde(rename = "job_status_changed")]
    JobStatusChanged {
        job_id: String,
        timestamp: i64,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_status: Option<String>,
    },
    #[serde(rename = "update_job_progress")]
    UpdateJobProgress {
        job_id: String,
        timestamp: i64,
        progress: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    #[serde(rename = "complete_job")]
    CompleteJob {
        job_id: String,
        timestamp: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    #[serde(rename = "job_failed")]
    JobFailed {
        job_id: String,
        timestamp: i64,
        error: String,
        #[serde(default)]
        cancelled: bool,
    },
    #[serde(rename = "worker_status_changed")]
    WorkerStatusChanged {
        worker_id: String,
        timestamp: i64,
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_status: Option<String>,
    },
    #[serde(rename = "worker_connected")]
    WorkerConnected {
        worker_id: String,
        timestamp: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        machine_id: Option<String>,
    },
    #[serde(rename = "worker_disconnected")]
    WorkerDisconnected {
        worker_id: String,
        timestamp: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    #[serde(rename = "connector_status_changed")]
    ConnectorStatusChanged {
        worker_id: String,
        timestamp: i64,
        connector: String,
        status: String,
    },
    #[serde(rename = "machine_startup")]
    MachineStartup { machine_id: String, timestamp: i64 },
    #[serde(rename = "machine_startup_step")]
    MachineStartupStep {
        machine_id: String,
        timestamp: i64,
        step_name: String,
        bucket: String,
    },
    #[serde(rename = "machine_startup_complete")]
    MachineStartupComplete { machine_id: String, timestamp: i64 },
    #[serde(rename = "machine_shutdown")]
    MachineShutdown {
        machine_id: String,
        timestamp: i64,
        reason: String,
    },
}

impl Event {
    /// The job id this event concerns, if any — used by Fan-Out to match
    /// SSE and duplex-client subscriptions (§4.E).
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Event::JobSubmitted { job_id, .. }
            | Event::JobAssigned { job_id, .. }
            | Event::JobStatusChanged { job_id, .. }
            | Event::UpdateJobProgress { job_id, .. }
            | Event::CompleteJob { job_id, .. }
            | Event::JobFailed { job_id, .. } => Some(job_id),
            _ => None,
        }
    }

    /// Whether this event should close a job-scoped SSE stream after
    /// delivery (§4.E rule 2, invariant 13).
    pub fn is_job_terminal(&self) -> bool {
        matches!(self, Event::CompleteJob { .. } | Event::JobFailed { .. })
    }

    /// Whether the job-to-submitter mapping entry for this event's job
    /// should be removed after delivery (§3.6).
    pub fn clears_submitter_mapping(&self) -> bool {
        self.is_job_terminal()
    }

    /// The topic string monitors subscribe to in order to match this event
    /// (§4.E rule 1). Coarse-grained: one topic per event family.
    pub fn topic(&self) -> &'static str {
        match self {
            Event::JobSubmitted { .. }
            | Event::JobAssigned { .. }
            | Event::JobStatusChanged { .. }
            | Event::UpdateJobProgress { .. }
            | Event::CompleteJob { .. }
            | Event::JobFailed { .. } => "jobs",
            Event::WorkerStatusChanged { .. }
            | Event::WorkerConnected { .. }
            | Event::WorkerDisconnected { .. }
            | Event::ConnectorStatusChanged { .. } => "workers",
            Event::MachineStartup { .. }
            | Event::MachineStartupStep { .. }
            | Event::MachineStartupComplete { .. }
            | Event::MachineShutdown { .. } => "machines",
        }
    }
}
