// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Event Bus (§4.B): subscribes to the exact channel set this gateway
//! understands, normalizes every message to a typed [`Event`], and hands it
//! to Fan-Out. Parse failures on individual messages are logged and
//! discarded — they never stop the loop (§7).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use jobmux_core::{Clock, Event, Job, JobStatus, Worker, WorkerStatus};
use jobmux_store::{keys, StoreAdapter, StoreMessage, StoreSubscriber};
use parking_lot::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::admin::AdminReconciler;
use crate::decode;
use crate::error::BusError;
use crate::fanout::FanOutEngine;

/// Delay before dispatching a `complete_job`-derived event, so any
/// still-in-flight progress updates are drained first (§4.B).
const COMPLETION_DELAY: Duration = Duration::from_millis(100);

/// Subscribes to the store's pub/sub channels, normalizes every message to
/// a typed event, and routes it through Fan-Out. Holds its own read-back
/// store handle, logically separate from the subscription connection
/// (§5: "Subscription connections MUST NOT issue arbitrary commands").
pub struct EventBus {
    subscriber: Box<dyn StoreSubscriber>,
    readback: Arc<dyn StoreAdapter>,
    fanout: Arc<FanOutEngine>,
    admin: Arc<AdminReconciler>,
    clock: Arc<dyn Clock>,
    last_job_status: RwLock<HashMap<String, JobStatus>>,
    last_worker_status: RwLock<HashMap<String, WorkerStatus>>,
}

impl EventBus {
    pub fn new(
        subscriber: Box<dyn StoreSubscriber>,
        readback: Arc<dyn StoreAdapter>,
        fanout: Arc<FanOutEngine>,
        admin: Arc<AdminReconciler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            subscriber,
            readback,
            fanout,
            admin,
            clock,
            last_job_status: RwLock::new(HashMap::new()),
            last_worker_status: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to the exact channel set named in §4.B, plus the legacy
    /// diagnostic channel kept solely to log anomalies.
    pub async fn subscribe_all(&mut self) -> Result<(), BusError> {
        self.readback.configure_keyspace_notifications().await?;
        self.subscriber
            .subscribe(&[
                keys::channels::UPDATE_JOB_PROGRESS,
                keys::channels::WORKER_STATUS,
                keys::channels::COMPLETE_JOB,
                keys::channels::MACHINE_STARTUP_EVENTS,
                keys::channels::WORKER_EVENTS,
                keys::channels::LEGACY_WORKER_STARTUP_EVENTS,
            ])
            .await?;
        self.subscriber
            .psubscribe(&[
                keys::channels::CONNECTOR_STATUS_PATTERN,
                keys::channels::KEYSPACE_JOB_PATTERN,
                keys::channels::KEYSPACE_WORKER_PATTERN,
            ])
            .await?;
        Ok(())
    }

    /// Runs the receive loop until the subscription connection closes or a
    /// store error surfaces. A transport failure here is not one of the
    /// "individual message" parse failures this component is required to
    /// swallow — it is surfaced to the caller.
    pub async fn run(mut self) -> Result<(), BusError> {
        loop {
            let message = match self.subscriber.next_message().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    info!("event bus subscription closed");
                    return Ok(());
                }
                Err(err) => return Err(BusError::from(err)),
            };
            self.handle_message(message).await;
        }
    }

    async fn handle_message(&self, message: StoreMessage) {
        let now_ms = self.clock.now_ms();
        let channel = message.channel.as_str();

        if channel == keys::channels::LEGACY_WORKER_STARTUP_EVENTS {
            warn!(payload = %message.payload, "message arrived on legacy worker startup channel, discarding");
            return;
        }

        let event = if channel == keys::channels::UPDATE_JOB_PROGRESS {
            decode::decode_update_job_progress(&message.payload, now_ms).ok()
        } else if channel == keys::channels::WORKER_STATUS {
            decode::decode_worker_status(&message.payload, now_ms).ok()
        } else if channel == keys::channels::COMPLETE_JOB {
            decode::decode_complete_job(&message.payload, now_ms).ok()
        } else if channel == keys::channels::WORKER_EVENTS {
            decode::decode_worker_event(&message.payload, now_ms).ok()
        } else if channel == keys::channels::MACHINE_STARTUP_EVENTS {
            self.handle_machine_event(&message.payload, now_ms).await
        } else if let Some(worker_id) = strip_connector_status_channel(channel) {
            decode::decode_connector_status(&message.payload, worker_id, now_ms).ok()
        } else if let Some(job_id) = strip_job_keyspace_channel(channel) {
            self.synthesize_job_event(job_id, now_ms).await
        } else if let Some(worker_id) = strip_worker_keyspace_channel(channel) {
            self.synthesize_worker_event(worker_id, now_ms).await
        } else {
            debug!(channel, "message on unrecognized channel, discarding");
            None
        };

        let Some(event) = event else {
            return;
        };

        self.dispatch(event);
    }

    /// Dispatches immediately, except a `complete_job` event which is
    /// delayed per the completion-ordering rule (§4.B). Spawned so the
    /// receive loop is never blocked by the sleep.
    fn dispatch(&self, event: Event) {
        let fanout = Arc::clone(&self.fanout);
        if matches!(event, Event::CompleteJob { .. }) {
            tokio::spawn(async move {
                sleep(COMPLETION_DELAY).await;
                fanout.dispatch(event).await;
            });
        } else {
            tokio::spawn(async move {
                fanout.dispatch(event).await;
            });
        }
    }

    /// Reads back the `job:{id}` hash and derives which concrete event a
    /// raw keyspace mutation represents (§4.B: "This read-back is the
    /// ground truth"). Returns `None` on any read or decode failure, or
    /// when the observed status has not changed since the last read.
    async fn synthesize_job_event(&self, job_id: &str, now_ms: i64) -> Option<Event> {
        let hash = self.readback.get_hash(&keys::job_key(job_id)).await.ok()?;
        if hash.is_empty() {
            return None;
        }
        let job = Job::from_hash(&hash).ok()?;

        let previous = self.last_job_status.write().insert(job_id.to_string(), job.status);
        if previous == Some(job.status) {
            return None;
        }

        Some(match job.status {
            JobStatus::Completed => Event::CompleteJob {
                job_id: job_id.to_string(),
                timestamp: now_ms,
                result: job.result,
            },
            JobStatus::Failed => Event::JobFailed {
                job_id: job_id.to_string(),
                timestamp: now_ms,
                error: job.error.unwrap_or_else(|| "unknown error".to_string()),
                cancelled: false,
            },
            status => Event::JobStatusChanged {
                job_id: job_id.to_string(),
                timestamp: now_ms,
                status: status.to_string(),
                previous_status: previous.map(|s| s.to_string()),
            },
        })
    }

    /// Decodes a machine lifecycle event and applies its hash-level state
    /// transition (§4.H) before the event is re-broadcast to monitors. The
    /// hash update is best-effort: a store failure here is logged, not
    /// allowed to swallow the event itself.
    async fn handle_machine_event(&self, payload: &str, now_ms: i64) -> Option<Event> {
        let event = decode::decode_machine_event(payload, now_ms).ok()?;
        if let Err(err) = self.admin.apply_machine_event(&event).await {
            warn!(error = %err, "failed to apply machine event to machine hash");
        }
        Some(event)
    }

    async fn synthesize_worker_event(&self, worker_id: &str, now_ms: i64) -> Option<Event> {
        let hash = self.readback.get_hash(&keys::worker_key(worker_id)).await.ok()?;
        if hash.is_empty() {
            return None;
        }
        let worker = Worker::from_hash(worker_id, &hash).ok()?;

        let previous = self
            .last_worker_status
            .write()
            .insert(worker_id.to_string(), worker.status);
        if previous == Some(worker.status) {
            return None;
        }

        Some(Event::WorkerStatusChanged {
            worker_id: worker_id.to_string(),
            timestamp: now_ms,
            status: worker.status.to_string(),
            previous_status: previous.map(|s| s.to_string()),
        })
    }
}

fn strip_connector_status_channel(channel: &str) -> Option<&str> {
    channel.strip_prefix("connector_status:")
}

fn strip_job_keyspace_channel(channel: &str) -> Option<&str> {
    let key = channel.strip_prefix("__keyspace@0__:")?;
    keys::job_id_from_key(key)
}

/// Only matches the worker's own hash key (`worker:{id}`), not its
/// heartbeat/jobs/status sub-keys, which also fall under the broader
/// `worker:*` keyspace pattern but carry no status semantics of their own.
fn strip_worker_keyspace_channel(channel: &str) -> Option<&str> {
    let key = channel.strip_prefix("__keyspace@0__:")?;
    let worker_id = key.strip_prefix("worker:")?;
    if worker_id.contains(':') {
        None
    } else {
        Some(worker_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobmux_core::FakeClock;
    use jobmux_registry::ConnectionRegistry;
    use jobmux_store::FakeStore;

    fn fanout() -> Arc<FanOutEngine> {
        Arc::new(FanOutEngine::new(Arc::new(ConnectionRegistry::new(None))))
    }

    fn admin(store: FakeStore, fanout: Arc<FanOutEngine>) -> Arc<AdminReconciler> {
        Arc::new(AdminReconciler::new(Arc::new(store), fanout, Arc::new(FakeClock::new())))
    }

    #[tokio::test]
    async fn job_keyspace_notification_synthesizes_status_changed() {
        let store = FakeStore::new();
        store
            .put_hash_fields(
                "job:job-1",
                &[
                    ("id", "job-1"),
                    ("service_required", "render"),
                    ("priority", "50"),
                    ("created_at", "2026-01-01T00:00:00Z"),
                    ("status", "in_progress"),
                ],
            )
            .await
            .unwrap();

        let fo = fanout();
        let bus = EventBus::new(
            Box::new(store.subscriber()),
            Arc::new(store.clone()),
            Arc::clone(&fo),
            admin(store.clone(), Arc::clone(&fo)),
            Arc::new(FakeClock::new()),
        );

        let event = bus.synthesize_job_event("job-1", 1234).await.unwrap();
        match event {
            Event::JobStatusChanged { status, .. } => assert_eq!(status, "in_progress"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn job_completed_status_synthesizes_complete_job() {
        let store = FakeStore::new();
        store
            .put_hash_fields(
                "job:job-1",
                &[
                    ("id", "job-1"),
                    ("service_required", "render"),
                    ("priority", "50"),
                    ("created_at", "2026-01-01T00:00:00Z"),
                    ("status", "completed"),
                ],
            )
            .await
            .unwrap();

        let fo = fanout();
        let bus = EventBus::new(
            Box::new(store.subscriber()),
            Arc::new(store.clone()),
            Arc::clone(&fo),
            admin(store.clone(), Arc::clone(&fo)),
            Arc::new(FakeClock::new()),
        );

        let event = bus.synthesize_job_event("job-1", 0).await.unwrap();
        assert!(matches!(event, Event::CompleteJob { .. }));
    }

    #[tokio::test]
    async fn repeated_read_of_unchanged_status_yields_no_event() {
        let store = FakeStore::new();
        store
            .put_hash_fields(
                "job:job-1",
                &[
                    ("id", "job-1"),
                    ("service_required", "render"),
                    ("priority", "50"),
                    ("created_at", "2026-01-01T00:00:00Z"),
                    ("status", "pending"),
                ],
            )
            .await
            .unwrap();

        let fo = fanout();
        let bus = EventBus::new(
            Box::new(store.subscriber()),
            Arc::new(store.clone()),
            Arc::clone(&fo),
            admin(store.clone(), Arc::clone(&fo)),
            Arc::new(FakeClock::new()),
        );

        assert!(bus.synthesize_job_event("job-1", 0).await.is_some());
        assert!(bus.synthesize_job_event("job-1", 0).await.is_none());
    }

    #[test]
    fn worker_keyspace_channel_rejects_sub_keys() {
        assert_eq!(
            strip_worker_keyspace_channel("__keyspace@0__:worker:w-1"),
            Some("w-1")
        );
        assert_eq!(
            strip_worker_keyspace_channel("__keyspace@0__:worker:w-1:heartbeat"),
            None
        );
    }
}
