// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection records (§3.4). All four variants share the
//! `send_text_frame`/`close` capability set via [`Connection`]; the
//! variant-specific state (job id of interest, subscription set, external
//! client id, topic set) wraps it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use jobmux_core::{ClientId, ConnectionId, ConnectionKind, JobId};
use parking_lot::RwLock;
use tokio::sync::{mpsc, Notify};

use crate::error::RegistryError;

/// The transport-agnostic half of a connection: a channel of outbound text
/// frames (JSON-encoded events) plus a close signal. The HTTP layer adapts
/// this to an SSE stream or a WebSocket sink.
pub struct Connection {
    pub id: ConnectionId,
    pub kind: ConnectionKind,
    sender: mpsc::UnboundedSender<String>,
    close_signal: Arc<Notify>,
    send_failures: AtomicU32,
}

impl Connection {
    pub fn new(id: ConnectionId, kind: ConnectionKind) -> (Self, mpsc::UnboundedReceiver<String>, Arc<Notify>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let close_signal = Arc::new(Notify::new());
        (
            Self {
                id,
                kind,
                sender,
                close_signal: Arc::clone(&close_signal),
                send_failures: AtomicU32::new(0),
            },
            receiver,
            close_signal,
        )
    }

    /// Writes one text frame. On any send error the connection is marked
    /// for removal (§3.4); the caller (Fan-Out) is responsible for then
    /// detaching it from the registry.
    pub fn send_text_frame(&self, frame: impl Into<String>) -> Result<(), RegistryError> {
        self.sender.send(frame.into()).map_err(|e| {
            self.send_failures.fetch_add(1, Ordering::Relaxed);
            RegistryError::SendFailure(e.to_string())
        })
    }

    pub fn close(&self) {
        self.close_signal.notify_waiters();
    }

    pub fn send_failure_count(&self) -> u32 {
        self.send_failures.load(Ordering::Relaxed)
    }
}

/// An SSE connection scoped to a single job id (`/api/jobs/:id/progress`).
pub struct ClientSse {
    pub conn: Connection,
    pub job_id: JobId,
}

/// A bidirectional connection that subscribes to an explicit set of job
/// ids (`subscribe_progress`/`unsubscribe_progress`).
pub struct ClientDuplex {
    pub conn: Connection,
    subscribed_jobs: RwLock<HashSet<String>>,
}

impl ClientDuplex {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            subscribed_jobs: RwLock::new(HashSet::new()),
        }
    }

    pub fn subscribe(&self, job_id: impl Into<String>) {
        self.subscribed_jobs.write().insert(job_id.into());
    }

    pub fn unsubscribe(&self, job_id: &str) {
        self.subscribed_jobs.write().remove(job_id);
    }

    pub fn is_subscribed(&self, job_id: &str) -> bool {
        self.subscribed_jobs.read().contains(job_id)
    }
}

/// A bidirectional connection identified by an externally-chosen client id
/// (`/ws/client/:id`); tracked across job lifetime via the job-to-submitter
/// map (§3.6) so terminal events are steered back to the submitter.
pub struct ClientNamed {
    pub conn: Connection,
    pub client_id: ClientId,
}

/// An operator monitor (`/api/events/monitor`, `/ws/monitor/:id`). Holds a
/// topic set; an empty set is a wildcard subscription (§4.E rule 1).
pub struct Monitor {
    pub conn: Connection,
    topics: RwLock<HashSet<String>>,
}

impl Monitor {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn,
            topics: RwLock::new(HashSet::new()),
        }
    }

    pub fn set_topics(&self, topics: impl IntoIterator<Item = String>) {
        *self.topics.write() = topics.into_iter().collect();
    }

    /// Whether this monitor should receive an event for `topic` (§4.E rule 1):
    /// subscribed to `"jobs"` (or the event's own topic) explicitly, or
    /// subscribed to nothing at all (wildcard).
    pub fn matches_topic(&self, topic: &str) -> bool {
        let topics = self.topics.read();
        topics.is_empty() || topics.contains(topic) || topics.contains("jobs")
    }
}
