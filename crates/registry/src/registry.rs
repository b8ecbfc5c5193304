// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Connection Registry (§4.D): the sole owner of every live
//! connection record. Fan-Out never touches a connection directly — it
//! looks connections up by id through this registry at delivery time
//! (§9 "cyclic references... resolved by making the registry the sole
//! owner").

use std::collections::HashMap;
use std::sync::Arc;

use jobmux_core::{ClientId, ConnectionId, ConnectionIdGen, ConnectionKind, JobId};
use parking_lot::RwLock;
use tokio::sync::{mpsc, Notify};

use crate::connection::{ClientDuplex, ClientNamed, ClientSse, Connection, Monitor};
use crate::error::RegistryError;

/// Handle returned on attach: the live frame receiver plus close signal the
/// HTTP layer drives its SSE/WS loop from.
pub struct AttachHandle {
    pub id: ConnectionId,
    pub frames: mpsc::UnboundedReceiver<String>,
    pub close_signal: Arc<Notify>,
}

/// The sole owner of Registry records and the job-to-submitter mapping
/// (§3.6, §9 "process-wide state... initialized during startup under a
/// single owning structure"). Each variant map is independently lockable so
/// write-during-iterate on one map never blocks fan-out on another.
pub struct ConnectionRegistry {
    sse: RwLock<HashMap<ConnectionId, Arc<ClientSse>>>,
    duplex: RwLock<HashMap<ConnectionId, Arc<ClientDuplex>>>,
    named: RwLock<HashMap<ConnectionId, Arc<ClientNamed>>>,
    monitors: RwLock<HashMap<ConnectionId, Arc<Monitor>>>,
    job_to_submitter: RwLock<HashMap<String, ConnectionId>>,
    id_gen: ConnectionIdGen,
    auth_secret: Option<String>,
}

impl ConnectionRegistry {
    /// `auth_secret` of `None` disables token validation entirely; `Some`
    /// enforces byte equality against any presented token while still
    /// allowing a missing token through, per §4.D.
    pub fn new(auth_secret: Option<String>) -> Self {
        Self {
            sse: RwLock::new(HashMap::new()),
            duplex: RwLock::new(HashMap::new()),
            named: RwLock::new(HashMap::new()),
            monitors: RwLock::new(HashMap::new()),
            job_to_submitter: RwLock::new(HashMap::new()),
            id_gen: ConnectionIdGen::default(),
            auth_secret,
        }
    }

    /// Validates a presented token (§4.D). A missing token is always
    /// accepted for backward compatibility on endpoints that predate auth.
    pub fn validate_token(&self, presented: Option<&str>) -> Result<(), RegistryError> {
        let Some(token) = presented else {
            return Ok(());
        };
        let Some(secret) = self.auth_secret.as_deref() else {
            return Ok(());
        };
        if constant_time_eq(token.as_bytes(), secret.as_bytes()) {
            Ok(())
        } else {
            Err(RegistryError::AuthFailure)
        }
    }

    pub fn attach_sse(&self, job_id: JobId) -> AttachHandle {
        let id = self.id_gen.next();
        let (conn, frames, close_signal) = Connection::new(id, ConnectionKind::ClientSse);
        self.sse.write().insert(id, Arc::new(ClientSse { conn, job_id }));
        AttachHandle { id, frames, close_signal }
    }

    pub fn attach_duplex(&self) -> AttachHandle {
        let id = self.id_gen.next();
        let (conn, frames, close_signal) = Connection::new(id, ConnectionKind::ClientDuplex);
        self.duplex.write().insert(id, Arc::new(ClientDuplex::new(conn)));
        AttachHandle { id, frames, close_signal }
    }

    pub fn attach_named(&self, client_id: ClientId) -> AttachHandle {
        let id = self.id_gen.next();
        let (conn, frames, close_signal) = Connection::new(id, ConnectionKind::ClientNamed);
        self.named.write().insert(id, Arc::new(ClientNamed { conn, client_id }));
        AttachHandle { id, frames, close_signal }
    }

    pub fn attach_monitor(&self) -> AttachHandle {
        let id = self.id_gen.next();
        let (conn, frames, close_signal) = Connection::new(id, ConnectionKind::Monitor);
        self.monitors.write().insert(id, Arc::new(Monitor::new(conn)));
        AttachHandle { id, frames, close_signal }
    }

    /// Detach is idempotent: removing an id that is not present is a no-op
    /// (§4.D). Closes the underlying connection first so any concurrent
    /// write loop observes the close signal.
    pub fn detach(&self, id: ConnectionId) {
        if let Some(entry) = self.sse.write().remove(&id) {
            entry.conn.close();
        }
        if let Some(entry) = self.duplex.write().remove(&id) {
            entry.conn.close();
        }
        if let Some(entry) = self.named.write().remove(&id) {
            entry.conn.close();
        }
        if let Some(entry) = self.monitors.write().remove(&id) {
            entry.conn.close();
        }
        // Drop any job-to-submitter entries this connection owned.
        self.job_to_submitter.write().retain(|_, owner| *owner != id);
    }

    pub fn sse_connections(&self) -> Vec<Arc<ClientSse>> {
        self.sse.read().values().cloned().collect()
    }

    pub fn sse_connection(&self, id: ConnectionId) -> Option<Arc<ClientSse>> {
        self.sse.read().get(&id).cloned()
    }

    pub fn duplex_connections(&self) -> Vec<Arc<ClientDuplex>> {
        self.duplex.read().values().cloned().collect()
    }

    pub fn named_connections(&self) -> Vec<Arc<ClientNamed>> {
        self.named.read().values().cloned().collect()
    }

    pub fn monitors(&self) -> Vec<Arc<Monitor>> {
        self.monitors.read().values().cloned().collect()
    }

    pub fn named_by_client_id(&self, client_id: &str) -> Option<Arc<ClientNamed>> {
        self.named
            .read()
            .values()
            .find(|entry| entry.client_id.as_str() == client_id)
            .cloned()
    }

    pub fn named_connection(&self, id: ConnectionId) -> Option<Arc<ClientNamed>> {
        self.named.read().get(&id).cloned()
    }

    pub fn duplex_connection(&self, id: ConnectionId) -> Option<Arc<ClientDuplex>> {
        self.duplex.read().get(&id).cloned()
    }

    pub fn monitor(&self, id: ConnectionId) -> Option<Arc<Monitor>> {
        self.monitors.read().get(&id).cloned()
    }

    /// Records that `connection_id` (a `ClientNamed`) submitted `job_id`
    /// (§3.6). Looked up by Fan-Out to steer completion/failure events back
    /// to the submitter.
    pub fn record_submitter(&self, job_id: impl Into<String>, connection_id: ConnectionId) {
        self.job_to_submitter.write().insert(job_id.into(), connection_id);
    }

    pub fn submitter_of(&self, job_id: &str) -> Option<ConnectionId> {
        self.job_to_submitter.read().get(job_id).copied()
    }

    /// Removes the job-to-submitter entry for `job_id` (§3.6: "Entry
    /// removed on terminal events for that job").
    pub fn clear_submitter(&self, job_id: &str) {
        self.job_to_submitter.write().remove(job_id);
    }

    pub fn connection_counts(&self) -> RegistryCounts {
        RegistryCounts {
            sse: self.sse.read().len(),
            duplex: self.duplex.read().len(),
            named: self.named.read().len(),
            monitors: self.monitors.read().len(),
        }
    }

    /// Closes every live connection with a final frame, for process
    /// shutdown (§5): "close all SSE connections with a final
    /// end-of-stream, close all sockets with a graceful close code".
    pub fn shutdown_all(&self) {
        for entry in self.sse.read().values() {
            entry.conn.close();
        }
        for entry in self.duplex.read().values() {
            entry.conn.close();
        }
        for entry in self.named.read().values() {
            entry.conn.close();
        }
        for entry in self.monitors.read().values() {
            entry.conn.close();
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryCounts {
    pub sse: usize,
    pub duplex: usize,
    pub named: usize,
    pub monitors: usize,
}

/// Constant-time byte comparison so token validation does not become a
/// timing oracle on the length/prefix of the configured secret.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_and_detach_is_idempotent() {
        let registry = ConnectionRegistry::new(None);
        let handle = registry.attach_monitor();
        assert_eq!(registry.connection_counts().monitors, 1);
        registry.detach(handle.id);
        assert_eq!(registry.connection_counts().monitors, 0);
        // Detaching again must not panic or error.
        registry.detach(handle.id);
        assert_eq!(registry.connection_counts().monitors, 0);
    }

    #[test]
    fn token_validation_allows_missing_token_but_rejects_mismatch() {
        let registry = ConnectionRegistry::new(Some("secret".to_string()));
        assert!(registry.validate_token(None).is_ok());
        assert!(registry.validate_token(Some("secret")).is_ok());
        assert!(registry.validate_token(Some("wrong")).is_err());
    }

    #[test]
    fn job_to_submitter_mapping_clears_on_detach() {
        let registry = ConnectionRegistry::new(None);
        let handle = registry.attach_named(ClientId::new("client-1"));
        registry.record_submitter("job-1", handle.id);
        assert_eq!(registry.submitter_of("job-1"), Some(handle.id));
        registry.detach(handle.id);
        assert_eq!(registry.submitter_of("job-1"), None);
    }
}
