// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Closed-set payload decoders for each pub/sub channel the Event Bus
//! subscribes to (§4.B). Every channel has a fixed, known shape, so this is
//! a set of individual decode functions rather than one untagged enum —
//! each decoder only has to understand its own channel's payload, and a
//! failure on one channel says nothing about the others.
//!
//! Decode failures are never fatal here (§7 "the Event Bus swallows parse
//! failures of individual messages"): every function returns
//! `Result<_, serde_json::Error>` and the caller in [`crate::bus`] logs and
//! discards on error.

use jobmux_core::Event;
use serde::Deserialize;
use serde_json::Value;

fn default_timestamp(given: Option<i64>, now_ms: i64) -> i64 {
    given.unwrap_or(now_ms)
}

#[derive(Debug, Deserialize)]
struct ProgressPayload {
    job_id: String,
    progress: f64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
}

pub fn decode_update_job_progress(payload: &str, now_ms: i64) -> Result<Event, serde_json::Error> {
    let parsed: ProgressPayload = serde_json::from_str(payload)?;
    Ok(Event::UpdateJobProgress {
        job_id: parsed.job_id,
        timestamp: default_timestamp(parsed.timestamp, now_ms),
        progress: parsed.progress,
        message: parsed.message,
    })
}

#[derive(Debug, Deserialize)]
struct CompletePayload {
    job_id: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    timestamp: Option<i64>,
}

pub fn decode_complete_job(payload: &str, now_ms: i64) -> Result<Event, serde_json::Error> {
    let parsed: CompletePayload = serde_json::from_str(payload)?;
    Ok(Event::CompleteJob {
        job_id: parsed.job_id,
        timestamp: default_timestamp(parsed.timestamp, now_ms),
        result: parsed.result,
    })
}

#[derive(Debug, Deserialize)]
struct WorkerStatusPayload {
    worker_id: String,
    status: String,
    #[serde(default)]
    previous_status: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
}

pub fn decode_worker_status(payload: &str, now_ms: i64) -> Result<Event, serde_json::Error> {
    let parsed: WorkerStatusPayload = serde_json::from_str(payload)?;
    Ok(Event::WorkerStatusChanged {
        worker_id: parsed.worker_id,
        timestamp: default_timestamp(parsed.timestamp, now_ms),
        status: parsed.status,
        previous_status: parsed.previous_status,
    })
}

/// Discriminated payload carried on `worker:events` (§6.3).
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WorkerEventPayload {
    Connected {
        worker_id: String,
        #[serde(default)]
        machine_id: Option<String>,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    Disconnected {
        worker_id: String,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

pub fn decode_worker_event(payload: &str, now_ms: i64) -> Result<Event, serde_json::Error> {
    let parsed: WorkerEventPayload = serde_json::from_str(payload)?;
    Ok(match parsed {
        WorkerEventPayload::Connected {
            worker_id,
            machine_id,
            timestamp,
        } => Event::WorkerConnected {
            worker_id,
            timestamp: default_timestamp(timestamp, now_ms),
            machine_id,
        },
        WorkerEventPayload::Disconnected {
            worker_id,
            reason,
            timestamp,
        } => Event::WorkerDisconnected {
            worker_id,
            timestamp: default_timestamp(timestamp, now_ms),
            reason,
        },
    })
}

#[derive(Debug, Deserialize)]
struct ConnectorStatusPayload {
    #[serde(default)]
    worker_id: Option<String>,
    connector: String,
    status: String,
    #[serde(default)]
    timestamp: Option<i64>,
}

/// Decodes a message on the `connector_status:*` pattern. `channel_worker_id`
/// is the worker id extracted from the channel name's suffix; it wins over
/// any `worker_id` field carried in the payload itself, since the channel
/// name is the more trustworthy source.
pub fn decode_connector_status(
    payload: &str,
    channel_worker_id: &str,
    now_ms: i64,
) -> Result<Event, serde_json::Error> {
    let parsed: ConnectorStatusPayload = serde_json::from_str(payload)?;
    let worker_id = parsed.worker_id.unwrap_or_else(|| channel_worker_id.to_string());
    Ok(Event::ConnectorStatusChanged {
        worker_id,
        timestamp: default_timestamp(parsed.timestamp, now_ms),
        connector: parsed.connector,
        status: parsed.status,
    })
}

/// Discriminated payload carried on `machine:startup:events` (§6.3, §4.H).
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum MachineEventPayload {
    Startup {
        machine_id: String,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    StartupStep {
        machine_id: String,
        step_name: String,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    StartupComplete {
        machine_id: String,
        #[serde(default)]
        timestamp: Option<i64>,
    },
    Shutdown {
        machine_id: String,
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

pub fn decode_machine_event(payload: &str, now_ms: i64) -> Result<Event, serde_json::Error> {
    let parsed: MachineEventPayload = serde_json::from_str(payload)?;
    Ok(match parsed {
        MachineEventPayload::Startup { machine_id, timestamp } => Event::MachineStartup {
            machine_id,
            timestamp: default_timestamp(timestamp, now_ms),
        },
        MachineEventPayload::StartupStep {
            machine_id,
            step_name,
            timestamp,
        } => {
            let bucket = bucket_label(jobmux_core::classify_startup_step(&step_name));
            Event::MachineStartupStep {
                machine_id,
                timestamp: default_timestamp(timestamp, now_ms),
                step_name,
                bucket,
            }
        }
        MachineEventPayload::StartupComplete { machine_id, timestamp } => {
            Event::MachineStartupComplete {
                machine_id,
                timestamp: default_timestamp(timestamp, now_ms),
            }
        }
        MachineEventPayload::Shutdown {
            machine_id,
            reason,
            timestamp,
        } => Event::MachineShutdown {
            machine_id,
            timestamp: default_timestamp(timestamp, now_ms),
            reason: reason.unwrap_or_else(|| "unspecified".to_string()),
        },
    })
}

fn bucket_label(bucket: jobmux_core::StartupStepBucket) -> String {
    let s = match bucket {
        jobmux_core::StartupStepBucket::SharedSetup => "shared_setup",
        jobmux_core::StartupStepBucket::CoreInfrastructure => "core_infrastructure",
        jobmux_core::StartupStepBucket::AiServices => "ai_services",
        jobmux_core::StartupStepBucket::SupportingServices => "supporting_services",
    };
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_progress_with_explicit_timestamp() {
        let event = decode_update_job_progress(
            r#"{"job_id":"job-1","progress":42.0,"timestamp":1700000000000}"#,
            0,
        )
        .unwrap();
        match event {
            Event::UpdateJobProgress { job_id, progress, timestamp, .. } => {
                assert_eq!(job_id, "job-1");
                assert_eq!(progress, 42.0);
                assert_eq!(timestamp, 1700000000000);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn progress_without_timestamp_falls_back_to_now() {
        let event = decode_update_job_progress(r#"{"job_id":"job-1","progress":10.0}"#, 555).unwrap();
        match event {
            Event::UpdateJobProgress { timestamp, .. } => assert_eq!(timestamp, 555),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_worker_connected_event() {
        let event = decode_worker_event(
            r#"{"event":"connected","worker_id":"w-1","machine_id":"m-1"}"#,
            0,
        )
        .unwrap();
        match event {
            Event::WorkerConnected { worker_id, machine_id, .. } => {
                assert_eq!(worker_id, "w-1");
                assert_eq!(machine_id.as_deref(), Some("m-1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn unknown_worker_event_kind_fails_to_decode() {
        assert!(decode_worker_event(r#"{"event":"mystery","worker_id":"w-1"}"#, 0).is_err());
    }

    #[test]
    fn connector_status_prefers_channel_worker_id() {
        let event = decode_connector_status(
            r#"{"connector":"s3","status":"ok"}"#,
            "w-7",
            0,
        )
        .unwrap();
        match event {
            Event::ConnectorStatusChanged { worker_id, connector, status, .. } => {
                assert_eq!(worker_id, "w-7");
                assert_eq!(connector, "s3");
                assert_eq!(status, "ok");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn machine_startup_step_is_classified_into_a_bucket() {
        let event = decode_machine_event(
            r#"{"event":"startup_step","machine_id":"m-1","step_name":"ai_services_load_model"}"#,
            0,
        )
        .unwrap();
        match event {
            Event::MachineStartupStep { bucket, .. } => assert_eq!(bucket, "ai_services"),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
