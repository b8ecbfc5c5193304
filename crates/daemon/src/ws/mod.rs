// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket transport (§6.2): three attach paths — monitor, named client,
//! and the duplex fallback for anything else — sharing one frame-forwarding
//! loop and close-code convention.

pub mod duplex;
pub mod monitor;
pub mod named;

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::SplitSink;
use futures::SinkExt;
use serde::Deserialize;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;

pub const CLOSE_AUTH_FAILURE: u16 = 1008;
pub const CLOSE_GRACEFUL: u16 = 1000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Forwards frames pushed onto the registry-owned channel to the socket's
/// write half, until the channel closes (connection detached) or the
/// close signal fires (process shutdown, §5).
pub async fn forward_frames(mut sink: SplitSink<WebSocket, Message>, mut frames: UnboundedReceiver<String>, close_signal: Arc<Notify>) {
    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Some(text) => {
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = close_signal.notified() => {
                let _ = sink
                    .send(Message::Close(Some(CloseFrame {
                        code: CLOSE_GRACEFUL,
                        reason: "server closing connection".into(),
                    })))
                    .await;
                break;
            }
        }
    }
}

/// Sends a single `1008` close frame for a token mismatch discovered right
/// after upgrade (§4.D), then drops the socket without attaching it to the
/// registry at all.
pub async fn reject_with_auth_failure(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: CLOSE_AUTH_FAILURE,
            reason: "auth token mismatch".into(),
        })))
        .await;
}
