// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Fan-Out Engine (§4.E): routes one typed event to the correct subset
//! of Registry connections. Never propagates a single recipient's send
//! failure as a failure of the overall dispatch (§7) — the connection is
//! just evicted and routing continues.

use std::sync::Arc;

use jobmux_core::Event;
use jobmux_registry::ConnectionRegistry;
use tracing::{debug, warn};

/// Routes events to monitors, job-scoped SSE clients, duplex clients, and
/// named clients (§4.E rules 1-4), looking connections up through the
/// registry at delivery time rather than holding them directly (§9).
pub struct FanOutEngine {
    registry: Arc<ConnectionRegistry>,
}

impl FanOutEngine {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Delivers `event` to every matching connection. Ordering between
    /// recipients is not guaranteed (§4.E); ordering to a single recipient
    /// follows the order `dispatch` is called in, which the Event Bus
    /// preserves except for the deliberate completion delay (§4.B).
    pub async fn dispatch(&self, event: Event) {
        let frame = match serde_json::to_string(&event) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "failed to encode event for fan-out");
                return;
            }
        };

        self.dispatch_to_monitors(&event, &frame);

        if let Some(job_id) = event.job_id() {
            self.dispatch_to_sse(job_id, &event, &frame);
            self.dispatch_to_duplex(job_id, &frame);
            self.dispatch_to_named(job_id, &event, &frame);
        }
    }

    fn dispatch_to_monitors(&self, event: &Event, frame: &str) {
        let topic = event.topic();
        for monitor in self.registry.monitors() {
            if !monitor.matches_topic(topic) {
                continue;
            }
            if monitor.conn.send_text_frame(frame.to_string()).is_err() {
                debug!(connection_id = ?monitor.conn.id, "evicting monitor after send failure");
                self.registry.detach(monitor.conn.id);
            }
        }
    }

    fn dispatch_to_sse(&self, job_id: &str, event: &Event, frame: &str) {
        for sse in self.registry.sse_connections() {
            if sse.job_id.as_str() != job_id {
                continue;
            }
            let send_result = sse.conn.send_text_frame(frame.to_string());
            if event.is_job_terminal() {
                // §4.E rule 2: close after writing the final frame (§8 invariant 13).
                sse.conn.close();
                self.registry.detach(sse.conn.id);
            } else if send_result.is_err() {
                self.registry.detach(sse.conn.id);
            }
        }
    }

    fn dispatch_to_duplex(&self, job_id: &str, frame: &str) {
        for duplex in self.registry.duplex_connections() {
            if !duplex.is_subscribed(job_id) {
                continue;
            }
            if duplex.conn.send_text_frame(frame.to_string()).is_err() {
                self.registry.detach(duplex.conn.id);
            }
        }
    }

    fn dispatch_to_named(&self, job_id: &str, event: &Event, frame: &str) {
        if let Some(connection_id) = self.registry.submitter_of(job_id) {
            if let Some(named) = self.registry.named_connection(connection_id) {
                if named.conn.send_text_frame(frame.to_string()).is_err() {
                    self.registry.detach(connection_id);
                }
            }
        }
        if event.clears_submitter_mapping() {
            self.registry.clear_submitter(job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobmux_core::{ClientId, JobId};

    fn completed_event(job_id: &str) -> Event {
        Event::CompleteJob {
            job_id: job_id.to_string(),
            timestamp: 0,
            result: None,
        }
    }

    fn progress_event(job_id: &str) -> Event {
        Event::UpdateJobProgress {
            job_id: job_id.to_string(),
            timestamp: 0,
            progress: 50.0,
            message: None,
        }
    }

    #[tokio::test]
    async fn sse_connection_closes_after_terminal_event() {
        let registry = Arc::new(ConnectionRegistry::new(None));
        let handle = registry.attach_sse(JobId::new("job-1"));
        let fanout = FanOutEngine::new(Arc::clone(&registry));

        fanout.dispatch(completed_event("job-1")).await;

        assert_eq!(registry.connection_counts().sse, 0);
        drop(handle);
    }

    #[tokio::test]
    async fn sse_connection_stays_open_after_progress_event() {
        let registry = Arc::new(ConnectionRegistry::new(None));
        let _handle = registry.attach_sse(JobId::new("job-1"));
        let fanout = FanOutEngine::new(Arc::clone(&registry));

        fanout.dispatch(progress_event("job-1")).await;

        assert_eq!(registry.connection_counts().sse, 1);
    }

    #[tokio::test]
    async fn named_client_receives_terminal_event_then_mapping_clears() {
        let registry = Arc::new(ConnectionRegistry::new(None));
        let handle = registry.attach_named(ClientId::new("client-1"));
        registry.record_submitter("job-1", handle.id);
        let fanout = FanOutEngine::new(Arc::clone(&registry));

        fanout.dispatch(completed_event("job-1")).await;

        assert_eq!(registry.submitter_of("job-1"), None);
    }

    #[tokio::test]
    async fn monitor_with_empty_topics_receives_everything() {
        let registry = Arc::new(ConnectionRegistry::new(None));
        let mut handle = registry.attach_monitor();
        let fanout = FanOutEngine::new(Arc::clone(&registry));

        fanout.dispatch(progress_event("job-1")).await;

        let frame = handle.frames.recv().await;
        assert!(frame.is_some());
    }
}
