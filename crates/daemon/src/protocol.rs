// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire message envelopes for the duplex/named/monitor socket surface
//! (§6.2). A closed set of decoded variants — anything else is rejected as
//! an error frame at the boundary rather than silently ignored, the same
//! posture the Event Bus's own decoders take (§7).

use jobmux_core::JobSubmission;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct JobIdPayload {
    job_id: String,
}

#[derive(Debug, Clone)]
pub enum ClientMessage {
    SubmitJob {
        message_id: Option<String>,
        submission: JobSubmission,
    },
    SubscribeProgress {
        message_id: Option<String>,
        job_id: String,
    },
    UnsubscribeProgress {
        message_id: Option<String>,
        job_id: String,
    },
    GetJobStatus {
        message_id: Option<String>,
        job_id: String,
    },
    CancelJob {
        message_id: Option<String>,
        job_id: String,
    },
}

/// Decodes one text frame from a duplex/named client connection. `raw` is
/// parsed twice: once for the envelope (`type`/`id`), once as a `Value` so
/// the per-type payload can be re-parsed without consuming the original
/// string.
pub fn decode_client_message(raw: &str) -> Result<ClientMessage, String> {
    let envelope: Envelope = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    match envelope.kind.as_str() {
        "submit_job" => {
            let submission: JobSubmission = serde_json::from_value(value).map_err(|e| e.to_string())?;
            Ok(ClientMessage::SubmitJob {
                message_id: envelope.id,
                submission,
            })
        }
        "subscribe_progress" => {
            let payload: JobIdPayload = serde_json::from_value(value).map_err(|e| e.to_string())?;
            Ok(ClientMessage::SubscribeProgress {
                message_id: envelope.id,
                job_id: payload.job_id,
            })
        }
        "unsubscribe_progress" => {
            let payload: JobIdPayload = serde_json::from_value(value).map_err(|e| e.to_string())?;
            Ok(ClientMessage::UnsubscribeProgress {
                message_id: envelope.id,
                job_id: payload.job_id,
            })
        }
        "get_job_status" => {
            let payload: JobIdPayload = serde_json::from_value(value).map_err(|e| e.to_string())?;
            Ok(ClientMessage::GetJobStatus {
                message_id: envelope.id,
                job_id: payload.job_id,
            })
        }
        "cancel_job" => {
            let payload: JobIdPayload = serde_json::from_value(value).map_err(|e| e.to_string())?;
            Ok(ClientMessage::CancelJob {
                message_id: envelope.id,
                job_id: payload.job_id,
            })
        }
        other => Err(format!("unrecognized message type: {other}")),
    }
}

#[derive(Debug, Clone)]
pub enum MonitorMessage {
    Connect { request_full_state: bool },
    Subscribe { topics: Vec<String> },
    Heartbeat,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MonitorConnectPayload {
    #[serde(default)]
    request_full_state: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SubscribePayload {
    #[serde(default)]
    topics: Vec<String>,
}

pub fn decode_monitor_message(raw: &str) -> Result<MonitorMessage, String> {
    let envelope: Envelope = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    match envelope.kind.as_str() {
        "monitor_connect" => {
            let payload: MonitorConnectPayload = serde_json::from_value(value).unwrap_or_default();
            Ok(MonitorMessage::Connect {
                request_full_state: payload.request_full_state,
            })
        }
        "subscribe" => {
            let payload: SubscribePayload = serde_json::from_value(value).map_err(|e| e.to_string())?;
            Ok(MonitorMessage::Subscribe { topics: payload.topics })
        }
        "heartbeat" => Ok(MonitorMessage::Heartbeat),
        other => Err(format!("unrecognized message type: {other}")),
    }
}

/// Builds a `{type, ..., message_id?, timestamp}` acknowledgment frame.
pub fn ack_frame(kind: &str, job_id: &str, message_id: Option<&str>, now_ms: i64) -> String {
    frame_with_id(
        serde_json::json!({"type": kind, "job_id": job_id, "timestamp": now_ms}),
        message_id,
    )
}

/// Builds the `{type:"error", message_id?, error, timestamp}` envelope.
pub fn error_frame(message_id: Option<&str>, error: &str, now_ms: i64) -> String {
    frame_with_id(serde_json::json!({"type": "error", "error": error, "timestamp": now_ms}), message_id)
}

fn frame_with_id(mut obj: Value, message_id: Option<&str>) -> String {
    if let Some(id) = message_id {
        obj["message_id"] = Value::String(id.to_string());
    }
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_submit_job_with_nested_submission_fields() {
        let raw = r#"{"type":"submit_job","id":"m-1","service_required":"render","priority":75}"#;
        match decode_client_message(raw).unwrap() {
            ClientMessage::SubmitJob { message_id, submission } => {
                assert_eq!(message_id.as_deref(), Some("m-1"));
                assert_eq!(submission.service_required.as_deref(), Some("render"));
                assert_eq!(submission.priority, Some(75));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn decodes_subscribe_progress() {
        let raw = r#"{"type":"subscribe_progress","job_id":"job-1"}"#;
        match decode_client_message(raw).unwrap() {
            ClientMessage::SubscribeProgress { job_id, .. } => assert_eq!(job_id, "job-1"),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unrecognized_client_message_type_is_rejected() {
        assert!(decode_client_message(r#"{"type":"mystery"}"#).is_err());
    }

    #[test]
    fn monitor_connect_defaults_request_full_state_to_false() {
        match decode_monitor_message(r#"{"type":"monitor_connect"}"#).unwrap() {
            MonitorMessage::Connect { request_full_state } => assert!(!request_full_state),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn monitor_subscribe_carries_topics() {
        match decode_monitor_message(r#"{"type":"subscribe","topics":["jobs","workers"]}"#).unwrap() {
            MonitorMessage::Subscribe { topics } => assert_eq!(topics, vec!["jobs", "workers"]),
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn error_frame_echoes_message_id_when_present() {
        let frame = error_frame(Some("req-1"), "bad", 0);
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["message_id"], "req-1");
        assert_eq!(value["error"], "bad");
    }
}
