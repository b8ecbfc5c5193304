// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job identifier, state machine, and the record persisted in the `job:{id}`
//! hash.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::Clock;
use crate::hash_codec::{self, HashDecodeError};
use crate::id::JobId;

pub const DEFAULT_PRIORITY: i64 = 50;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Sum of states a job may occupy (§3.1).
///
/// Closed set; unknown values on decode are rejected rather than silently
/// accepted, matching this workspace's convention of rejecting unknown
/// wire variants at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Queued,
    Assigned,
    Accepted,
    InProgress,
    Completed,
    Failed,
    Cancelled,
    Timeout,
    Unworkable,
}

impl JobStatus {
    /// Whether a job in this status must hold exactly one entry in the
    /// pending sorted set (invariant 1).
    pub fn is_pending(&self) -> bool {
        matches!(self, JobStatus::Pending)
    }

    /// Whether a job in this status has already been handed a `worker_id`
    /// by a prior assignment.
    pub fn has_prior_assignment(&self) -> bool {
        matches!(
            self,
            JobStatus::Assigned
                | JobStatus::Accepted
                | JobStatus::InProgress
                | JobStatus::Completed
                | JobStatus::Failed
        )
    }

    /// Terminal states are absorbing for the duration of this process.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed
                | JobStatus::Failed
                | JobStatus::Cancelled
                | JobStatus::Timeout
                | JobStatus::Unworkable
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Queued => "queued",
            JobStatus::Assigned => "assigned",
            JobStatus::Accepted => "accepted",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Timeout => "timeout",
            JobStatus::Unworkable => "unworkable",
        };
        write!(f, "{s}")
    }
}

/// The record persisted in the `job:{id}` hash (§3.1, §6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub service_required: String,
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_datetime: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,

    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<Value>,

    pub status: JobStatus,

    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<String>,

    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failed_worker: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Fields accepted from a submission payload (§4.G); everything else is
/// defaulted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSubmission {
    #[serde(default)]
    pub service_required: Option<String>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(rename = "type", default)]
    pub legacy_type: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub workflow_priority: Option<i64>,
    #[serde(default)]
    pub workflow_datetime: Option<i64>,
    #[serde(default)]
    pub step_number: Option<u32>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub payload: Value,
    #[serde(default)]
    pub requirements: Option<Value>,
    #[serde(default)]
    pub max_retries: Option<u32>,
}

impl JobSubmission {
    /// Resolution order from §4.G: explicit `service_required`, legacy
    /// `job_type`, legacy `type`, fallback literal `"unknown"`.
    pub fn resolve_service_required(&self) -> String {
        self.service_required
            .clone()
            .or_else(|| self.job_type.clone())
            .or_else(|| self.legacy_type.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// `emprops_api` when the submission carries a `customer_id`,
    /// `emprops_ui` otherwise. A telemetry hint, not a security boundary
    /// (§4.G, §9 Open Questions).
    pub fn origin(&self) -> &'static str {
        if self.customer_id.is_some() {
            "emprops_api"
        } else {
            "emprops_ui"
        }
    }
}

impl Job {
    /// Construct a fresh pending job from a submission, per §4.G step 2.
    pub fn new(id: JobId, submission: &JobSubmission, clock: &dyn Clock) -> Self {
        Self {
            id,
            service_required: submission.resolve_service_required(),
            priority: submission.priority.unwrap_or(DEFAULT_PRIORITY),
            workflow_id: submission.workflow_id.clone(),
            workflow_priority: submission.workflow_priority,
            workflow_datetime: submission.workflow_datetime,
            step_number: submission.step_number,
            customer_id: submission.customer_id.clone(),
            payload: submission.payload.clone(),
            requirements: submission.requirements.clone(),
            status: JobStatus::Pending,
            created_at: clock.now().to_rfc3339(),
            assigned_at: None,
            started_at: None,
            completed_at: None,
            failed_at: None,
            retry_count: 0,
            max_retries: submission.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            last_failed_worker: None,
            worker_id: None,
            result: None,
            error: None,
        }
    }

    /// Returns the job to `pending`, clearing assignment state, as done by
    /// worker reset and orphan sweep (§4.H).
    pub fn reset_to_pending(&mut self) {
        self.status = JobStatus::Pending;
        self.worker_id = None;
        self.assigned_at = None;
        self.started_at = None;
    }

    pub fn cancel(&mut self, clock: &dyn Clock) {
        self.status = JobStatus::Failed;
        self.error = Some("Job cancelled by user".to_string());
        self.failed_at = Some(clock.now().to_rfc3339());
    }

    /// Encodes this record as the flat `field -> string` pairs written to
    /// the `job:{id}` hash (§6.3). Workers mutate a subset of these fields
    /// directly, which is what keyspace notifications observe (§4.B).
    pub fn to_hash_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![
            ("id".to_string(), self.id.as_str().to_string()),
            ("service_required".to_string(), self.service_required.clone()),
            ("priority".to_string(), self.priority.to_string()),
            ("payload".to_string(), self.payload.to_string()),
            ("status".to_string(), self.status.to_string()),
            ("created_at".to_string(), self.created_at.clone()),
            ("retry_count".to_string(), self.retry_count.to_string()),
            ("max_retries".to_string(), self.max_retries.to_string()),
        ];
        let mut push_opt = |key: &str, value: &Option<String>| {
            if let Some(v) = value {
                fields.push((key.to_string(), v.clone()));
            }
        };
        push_opt("workflow_id", &self.workflow_id);
        push_opt("customer_id", &self.customer_id);
        push_opt("assigned_at", &self.assigned_at);
        push_opt("started_at", &self.started_at);
        push_opt("completed_at", &self.completed_at);
        push_opt("failed_at", &self.failed_at);
        push_opt("last_failed_worker", &self.last_failed_worker);
        push_opt("worker_id", &self.worker_id);
        push_opt("error", &self.error);
        if let Some(p) = self.workflow_priority {
            fields.push(("workflow_priority".to_string(), p.to_string()));
        }
        if let Some(t) = self.workflow_datetime {
            fields.push(("workflow_datetime".to_string(), t.to_string()));
        }
        if let Some(n) = self.step_number {
            fields.push(("step_number".to_string(), n.to_string()));
        }
        if let Some(requirements) = &self.requirements {
            fields.push(("requirements".to_string(), requirements.to_string()));
        }
        if let Some(result) = &self.result {
            fields.push(("result".to_string(), result.to_string()));
        }
        fields
    }

    /// Decodes a `job:{id}` hash back into a [`Job`] (§6.3 round-trip, §8
    /// invariant 7).
    pub fn from_hash(hash: &HashMap<String, String>) -> Result<Self, HashDecodeError> {
        Ok(Self {
            id: JobId::new(hash_codec::require(hash, "id")?.to_string()),
            service_required: hash_codec::require(hash, "service_required")?.to_string(),
            priority: hash_codec::require(hash, "priority")?
                .parse()
                .map_err(|e: std::num::ParseIntError| HashDecodeError::new("priority", e.to_string()))?,
            workflow_id: hash_codec::opt_string(hash, "workflow_id"),
            workflow_priority: hash_codec::opt_i64(hash, "workflow_priority")?,
            workflow_datetime: hash_codec::opt_i64(hash, "workflow_datetime")?,
            step_number: hash_codec::opt_u32(hash, "step_number")?,
            customer_id: hash_codec::opt_string(hash, "customer_id"),
            payload: hash_codec::opt_json(hash, "payload")?.unwrap_or(Value::Null),
            requirements: hash_codec::opt_json(hash, "requirements")?,
            status: hash_codec::require_enum(hash, "status")?,
            created_at: hash_codec::require(hash, "created_at")?.to_string(),
            assigned_at: hash_codec::opt_string(hash, "assigned_at"),
            started_at: hash_codec::opt_string(hash, "started_at"),
            completed_at: hash_codec::opt_string(hash, "completed_at"),
            failed_at: hash_codec::opt_string(hash, "failed_at"),
            retry_count: hash_codec::opt_u32(hash, "retry_count")?.unwrap_or(0),
            max_retries: hash_codec::opt_u32(hash, "max_retries")?.unwrap_or(DEFAULT_MAX_RETRIES),
            last_failed_worker: hash_codec::opt_string(hash, "last_failed_worker"),
            worker_id: hash_codec::opt_string(hash, "worker_id"),
            result: hash_codec::opt_json(hash, "result")?,
            error: hash_codec::opt_string(hash, "error"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;

    #[test]
    fn resolve_service_required_prefers_explicit_field() {
        let sub = JobSubmission {
            service_required: Some("render".to_string()),
            job_type: Some("legacy-render".to_string()),
            ..Default::default()
        };
        assert_eq!(sub.resolve_service_required(), "render");
    }

    #[test]
    fn resolve_service_required_falls_back_through_legacy_fields() {
        let sub = JobSubmission {
            job_type: Some("legacy-render".to_string()),
            ..Default::default()
        };
        assert_eq!(sub.resolve_service_required(), "legacy-render");

        let sub = JobSubmission {
            legacy_type: Some("very-legacy".to_string()),
            ..Default::default()
        };
        assert_eq!(sub.resolve_service_required(), "very-legacy");
    }

    #[test]
    fn resolve_service_required_defaults_to_unknown() {
        let sub = JobSubmission::default();
        assert_eq!(sub.resolve_service_required(), "unknown");
    }

    #[test]
    fn origin_depends_only_on_customer_id() {
        let sub = JobSubmission {
            customer_id: Some("cust-1".to_string()),
            ..Default::default()
        };
        assert_eq!(sub.origin(), "emprops_api");

        let sub = JobSubmission::default();
        assert_eq!(sub.origin(), "emprops_ui");
    }

    #[test]
    fn new_job_defaults_priority_and_retries() {
        let clock = FakeClock::new();
        let sub = JobSubmission::default();
        let job = Job::new(JobId::new("job-1"), &sub, &clock);
        assert_eq!(job.priority, DEFAULT_PRIORITY);
        assert_eq!(job.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(job.retry_count, 0);
        assert!(job.status.is_pending());
        assert_eq!(job.service_required, "unknown");
    }

    #[test]
    fn cancel_marks_failed_with_contract_error_message() {
        let clock = FakeClock::new();
        let sub = JobSubmission::default();
        let mut job = Job::new(JobId::new("job-1"), &sub, &clock);
        job.cancel(&clock);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("Job cancelled by user"));
        assert!(job.failed_at.is_some());
    }

    // §8 invariant 7 — round-trip law.
    #[test]
    fn job_round_trips_through_hash_fields() {
        let clock = FakeClock::new();
        let sub = JobSubmission {
            service_required: Some("render".to_string()),
            priority: Some(75),
            payload: serde_json::json!({"scene": "a.blend"}),
            ..Default::default()
        };
        let job = Job::new(JobId::new("job-1"), &sub, &clock);
        let fields: std::collections::HashMap<String, String> =
            job.to_hash_fields().into_iter().collect();
        let decoded = Job::from_hash(&fields).unwrap();
        assert_eq!(decoded.id, job.id);
        assert_eq!(decoded.service_required, "render");
        assert_eq!(decoded.priority, 75);
        assert_eq!(decoded.payload, job.payload);
        assert_eq!(decoded.status, JobStatus::Pending);
    }

    #[test]
    fn from_hash_rejects_unknown_status() {
        let mut fields = std::collections::HashMap::new();
        fields.insert("id".to_string(), "job-1".to_string());
        fields.insert("service_required".to_string(), "render".to_string());
        fields.insert("priority".to_string(), "50".to_string());
        fields.insert("created_at".to_string(), "2026-01-01T00:00:00Z".to_string());
        fields.insert("status".to_string(), "not_a_real_status".to_string());
        assert!(Job::from_hash(&fields).is_err());
    }
}
