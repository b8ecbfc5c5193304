// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server-Sent Events routes (§6.1): per-job progress and the operator
//! monitor stream. Both push their registry-assigned frame channel through
//! axum's `Sse` response, wrapped so the registry entry is detached the
//! moment the client disconnects and the stream is dropped.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, StreamExt};
use jobmux_core::{ConnectionId, JobId};
use jobmux_registry::ConnectionRegistry;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::GatewayError;
use crate::state::AppState;
use crate::ws::TokenQuery;

/// Detaches the owning connection from the registry when the wrapped
/// stream is dropped, which is axum's signal that the client disconnected.
struct DetachOnDrop {
    inner: Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>,
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
}

impl DetachOnDrop {
    fn new(
        inner: impl Stream<Item = Result<Event, Infallible>> + Send + 'static,
        registry: Arc<ConnectionRegistry>,
        id: ConnectionId,
    ) -> Self {
        Self {
            inner: Box::pin(inner),
            registry,
            id,
        }
    }
}

impl Stream for DetachOnDrop {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for DetachOnDrop {
    fn drop(&mut self) {
        self.registry.detach(self.id);
    }
}

pub async fn job_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let handle = state.registry.attach_sse(JobId::new(job_id.clone()));

    if let Some(sse_conn) = state.registry.sse_connection(handle.id) {
        let frame = serde_json::json!({
            "type": "connected",
            "job_id": job_id,
            "client_id": handle.id.to_string(),
            "timestamp": state.clock.now_ms(),
        })
        .to_string();
        let _ = sse_conn.conn.send_text_frame(frame);
    }

    let stream = UnboundedReceiverStream::new(handle.frames).map(|frame| Ok(Event::default().data(frame)));
    Sse::new(DetachOnDrop::new(stream, Arc::clone(&state.registry), handle.id)).keep_alive(KeepAlive::default())
}

pub async fn monitor_stream(
    State(state): State<AppState>,
    Query(params): Query<TokenQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, GatewayError> {
    state.registry.validate_token(params.token.as_deref())?;

    let monitor_id = state.id_gen.next();
    let handle = state.registry.attach_monitor();

    if let Some(monitor) = state.registry.monitor(handle.id) {
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

    let stream = UnboundedReceiverStream::new(handle.frames).map(|frame| Ok(Event::default().data(frame)));
    Ok(Sse::new(DetachOnDrop::new(stream, Arc::clone(&state.registry), handle.id)).keep_alive(KeepAlive::default()))
}
