// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The legacy duplex socket (§6.2 "anything else -> legacy"): a
//! bidirectional connection with its own explicit job-subscription set,
//! supporting all five recognized client-side message types.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use jobmux_core::ConnectionId;

use crate::protocol::{ack_frame, decode_client_message, error_frame, ClientMessage};
use crate::state::AppState;
use crate::ws::{forward_frames, reject_with_auth_failure};

/// Entry point for the router-level `fallback`, which extracts the upgrade
/// itself (so a non-WS request to an unmatched path gets the extractor's
/// own rejection rather than silently upgrading).
pub async fn handle_legacy_socket(socket: WebSocket, state: AppState, token: Option<String>) {
    handle(socket, state, token).await;
}

async fn handle(socket: WebSocket, state: AppState, token: Option<String>) {
    if state.registry.validate_token(token.as_deref()).is_err() {
        reject_with_auth_failure(socket).await;
        return;
    }

    let handle = state.registry.attach_duplex();
    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(forward_frames(sink, handle.frames, Arc::clone(&handle.close_signal)));

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => handle_message(&state, handle.id, &text).await,
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.registry.detach(handle.id);
    let _ = writer.await;
}

async fn handle_message(state: &AppState, connection_id: ConnectionId, text: &str) {
    let Some(duplex) = state.registry.duplex_connection(connection_id) else {
        return;
    };
    match decode_client_message(text) {
        Ok(ClientMessage::SubmitJob { message_id, submission }) => match state.admission.submit(submission).await {
            Ok(job_id) => {
                let _ = duplex
                    .conn
                    .send_text_frame(ack_frame("job_submitted", job_id.as_str(), message_id.as_deref(), state.clock.now_ms()));
            }
            Err(err) => {
                let _ = duplex
                    .conn
                    .send_text_frame(error_frame(message_id.as_deref(), &err.to_string(), state.clock.now_ms()));
            }
        },
        Ok(ClientMessage::SubscribeProgress { message_id, job_id }) => {
            duplex.subscribe(job_id.clone());
            let _ = duplex
                .conn
                .send_text_frame(ack_frame("subscribed", &job_id, message_id.as_deref(), state.clock.now_ms()));
        }
        Ok(ClientMessage::UnsubscribeProgress { message_id, job_id }) => {
            duplex.unsubscribe(&job_id);
            let _ = duplex
                .conn
                .send_text_frame(ack_frame("unsubscribed", &job_id, message_id.as_deref(), state.clock.now_ms()));
        }
        Ok(ClientMessage::GetJobStatus { message_id, job_id }) => match state.jobs.get(&job_id).await {
            Ok(job) => {
                let frame = serde_json::json!({
                    "type": "job_status",
                    "job": job,
                    "message_id": message_id,
                    "timestamp": state.clock.now_ms(),
                })
                .to_string();
                let _ = duplex.conn.send_text_frame(frame);
            }
            Err(err) => {
                let _ = duplex
                    .conn
                    .send_text_frame(error_frame(message_id.as_deref(), &err.to_string(), state.clock.now_ms()));
            }
        },
        Ok(ClientMessage::CancelJob { message_id, job_id }) => match state.admin.cancel_job(&job_id).await {
            Ok(()) => {
                let _ = duplex
                    .conn
                    .send_text_frame(ack_frame("job_cancelled", &job_id, message_id.as_deref(), state.clock.now_ms()));
            }
            Err(err) => {
                let _ = duplex
                    .conn
                    .send_text_frame(error_frame(message_id.as_deref(), &err.to_string(), state.clock.now_ms()));
            }
        },
        Err(err) => {
            let _ = duplex.conn.send_text_frame(error_frame(None, &err, state.clock.now_ms()));
        }
    }
}
