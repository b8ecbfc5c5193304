// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/ws/monitor/:id` (§6.2): an operator monitor connection. Sends
//! `connected` then `full_state_snapshot` on attach, accepts `subscribe`
//! (topic set), `monitor_connect` (re-request the snapshot), and
//! `heartbeat`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use jobmux_core::ConnectionId;

use crate::protocol::{decode_monitor_message, error_frame, MonitorMessage};
use crate::state::AppState;
use crate::ws::{forward_frames, reject_with_auth_failure, TokenQuery};

pub async fn monitor_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(monitor_id): Path<String>,
    Query(params): Query<TokenQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle(socket, state, monitor_id, params.token))
}

async fn handle(socket: WebSocket, state: AppState, monitor_id: String, token: Option<String>) {
    if state.registry.validate_token(token.as_deref()).is_err() {
        reject_with_auth_failure(socket).await;
        return;
    }

    let handle = state.registry.attach_monitor();
    send_connected_and_snapshot(&state, handle.id, &monitor_id).await;

    let (sink, mut stream) = socket.split();
    let writer = tokio::spawn(forward_frames(sink, handle.frames, Arc::clone(&handle.close_signal)));

    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                match decode_monitor_message(&text) {
                    Ok(MonitorMessage::Subscribe { topics }) => {
                        if let Some(monitor) = state.registry.monitor(handle.id) {
                            monitor.set_topics(topics);
                        }
                    }
                    Ok(MonitorMessage::Connect { request_full_state }) => {
                        if request_full_state {
                            send_connected_and_snapshot(&state, handle.id, &monitor_id).await;
                        }
                    }
                    Ok(MonitorMessage::Heartbeat) => {}
                    Err(err) => {
                        if let Some(monitor) = state.registry.monitor(handle.id) {
                            let _ = monitor.conn.send_text_frame(error_frame(None, &err, state.clock.now_ms()));
                        }
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.registry.detach(handle.id);
    let _ = writer.await;
}

async fn send_connected_and_snapshot(state: &AppState, connection_id: ConnectionId, monitor_id: &str) {
    let Some(monitor) = state.registry.monitor(connection_id) else {
        return;
    };
    let now_ms = state.clock.now_ms();
    let _ = monitor
        .conn
        .send_text_frame(serde_json::json!({"type": "connected", "monitor_id": monitor_id, "timestamp": now_ms}).to_string());

    match state.snapshot.build().await {
        Ok(snapshot) => {
            let frame = serde_json::json!({
                "type": "full_state_snapshot",
                "data": snapshot,
                "monitor_id": monitor_id,
                "timestamp": state.clock.now_ms(),
            })
            .to_string();
            let _ = monitor.conn.send_text_frame(frame);
        }
        Err(err) => {
            tracing::warn!(error = %err, "failed to build monitor snapshot");
        }
    }
}
