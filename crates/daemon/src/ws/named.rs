// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/ws/client/:id` (§6.2): a bidirectional connection identified by an
//! externally-chosen client id, tracked via the job-to-submitter map so
//! completion/failure events steer back to the submitter even after the
//! initial ack. Has no job subscription set of its own — `ClientDuplex`
//! (the legacy fallback) is the one that subscribes to an explicit job set.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use jobmux_core::{ClientId, ConnectionId};

use crate::protocol::{ack_frame, decode_client_message, error_frame, ClientMessage};
use crate::state::AppState;
use crate::ws::{forward_frames, reject_with_auth_failure, TokenQuery};

pub async fn named_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    Query(params): Query<TokenQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle(socket, state, client_id, params.token))
}

async fn handle(socket: WebSocket, state: AppState, client_id: String, token: Option<String>) {
    if state.registry.validate_token(token.as_deref()).is_err() {
        reject_with_auth_failure(socket).await;
        return;
    }

    let handle = state.registry.attach_named(ClientId::new(client_id));
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
    let Some(named) = state.registry.named_connection(connection_id) else {
        return;
    };
    match decode_client_message(text) {
        Ok(ClientMessage::SubmitJob { message_id, submission }) => match state.admission.submit(submission).await {
            Ok(job_id) => {
                state.registry.record_submitter(job_id.as_str().to_string(), connection_id);
                let _ = named
                    .conn
                    .send_text_frame(ack_frame("job_submitted", job_id.as_str(), message_id.as_deref(), state.clock.now_ms()));
            }
            Err(err) => {
                let _ = named
                    .conn
                    .send_text_frame(error_frame(message_id.as_deref(), &err.to_string(), state.clock.now_ms()));
            }
        },
        Ok(ClientMessage::GetJobStatus { message_id, job_id }) => match state.jobs.get(&job_id).await {
            Ok(job) => {
                let frame = serde_json::json!({
                    "type": "job_status",
                    "job": job,
                    "message_id": message_id,
                    "timestamp": state.clock.now_ms(),
                })
                .to_string();
                let _ = named.conn.send_text_frame(frame);
            }
            Err(err) => {
                let _ = named
                    .conn
                    .send_text_frame(error_frame(message_id.as_deref(), &err.to_string(), state.clock.now_ms()));
            }
        },
        Ok(ClientMessage::CancelJob { message_id, job_id }) => match state.admin.cancel_job(&job_id).await {
            Ok(()) => {
                let _ = named
                    .conn
                    .send_text_frame(ack_frame("job_cancelled", &job_id, message_id.as_deref(), state.clock.now_ms()));
            }
            Err(err) => {
                let _ = named
                    .conn
                    .send_text_frame(error_frame(message_id.as_deref(), &err.to_string(), state.clock.now_ms()));
            }
        },
        Ok(ClientMessage::SubscribeProgress { message_id, .. }) | Ok(ClientMessage::UnsubscribeProgress { message_id, .. }) => {
            let _ = named.conn.send_text_frame(error_frame(
                message_id.as_deref(),
                "subscribe_progress is not supported on a named client connection",
                state.clock.now_ms(),
            ));
        }
        Err(err) => {
            let _ = named.conn.send_text_frame(error_frame(None, &err, state.clock.now_ms()));
        }
    }
}
