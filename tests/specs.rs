// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level integration tests: multiple crates wired together the
//! same way `jobmuxd` wires them, exercised against the in-memory
//! [`FakeStore`] rather than a live Redis. Scenario numbers in the test
//! names refer to the end-to-end scenarios this gateway is expected to
//! satisfy (priority ordering, cancellation, monitor attach, orphan sweep,
//! completion delivery delay).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use jobmux_core::{Clock, FakeClock, JobStatus, SequentialIdGen};
use jobmux_engine::{
    AdminReconciler, AdmissionPipeline, CleanupOptions, EventBus, FanOutEngine, JobListOptions, JobQuery,
    SnapshotBuilder,
};
use jobmux_registry::ConnectionRegistry;
use jobmux_store::{keys, FakeStore, StoreAdapter};

fn harness(store: FakeStore, clock: Arc<FakeClock>) -> (Arc<AdmissionPipeline>, Arc<AdminReconciler>, Arc<JobQuery>, Arc<SnapshotBuilder>, Arc<ConnectionRegistry>) {
    let store: Arc<dyn StoreAdapter> = Arc::new(store);
    let registry = Arc::new(ConnectionRegistry::new(None));
    let fanout = Arc::new(FanOutEngine::new(Arc::clone(&registry)));
    let clock: Arc<dyn Clock> = clock;
    let admission = Arc::new(AdmissionPipeline::new(
        Arc::clone(&store),
        Arc::clone(&fanout),
        Arc::new(SequentialIdGen::new("job")),
        Arc::clone(&clock),
    ));
    let admin = Arc::new(AdminReconciler::new(Arc::clone(&store), Arc::clone(&fanout), Arc::clone(&clock)));
    let jobs = Arc::new(JobQuery::new(Arc::clone(&store)));
    let snapshot = Arc::new(SnapshotBuilder::new(store, clock));
    (admission, admin, jobs, snapshot, registry)
}

fn submission(priority: i64) -> jobmux_core::JobSubmission {
    jobmux_core::JobSubmission {
        service_required: Some("render".to_string()),
        priority: Some(priority),
        payload: serde_json::json!({"scene": "a.blend"}),
        ..Default::default()
    }
}

// S1/S2 — priority dominance and FIFO-within-tier, exercised through the
// real admission pipeline's pending sorted set rather than the scoring
// formula in isolation.
#[tokio::test]
async fn pending_set_orders_submissions_by_priority_then_by_arrival() {
    let store = FakeStore::new();
    let clock = Arc::new(FakeClock::new());
    let (admission, _admin, _jobs, _snapshot, _registry) = harness(store.clone(), Arc::clone(&clock));

    let low = admission.submit(submission(10)).await.unwrap();
    clock.advance_ms(1_000);
    let high_first = admission.submit(submission(90)).await.unwrap();
    clock.advance_ms(1_000);
    let high_second = admission.submit(submission(90)).await.unwrap();

    let ordered = store
        .range_by_score(keys::PENDING_SET, i64::MIN, i64::MAX, true, None)
        .await
        .unwrap();

    assert_eq!(
        ordered,
        vec![high_first.as_str().to_string(), high_second.as_str().to_string(), low.as_str().to_string()]
    );
}

#[tokio::test]
async fn submitted_job_is_visible_through_query_and_lands_in_the_pending_bucket() {
    let store = FakeStore::new();
    let clock = Arc::new(FakeClock::new());
    let (admission, _admin, jobs, snapshot, _registry) = harness(store.clone(), clock);

    let id = admission.submit(submission(50)).await.unwrap();

    let fetched = jobs.get(id.as_str()).await.unwrap();
    assert_eq!(fetched.status, JobStatus::Pending);

    let listed = jobs
        .list(JobListOptions {
            status: Some("pending".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, fetched.id);

    let snap = snapshot.build().await.unwrap();
    assert_eq!(snap.jobs.pending.len(), 1);
    assert!(snap.jobs.active.is_empty());
}

// S3 — cancelling a still-pending job removes it from the pending sorted
// set and moves it out of the snapshot's pending bucket into failed.
#[tokio::test]
async fn cancelling_a_pending_job_clears_it_from_the_queue_and_snapshot() {
    let store = FakeStore::new();
    let clock = Arc::new(FakeClock::new());
    let (admission, admin, jobs, snapshot, _registry) = harness(store.clone(), clock);

    let id = admission.submit(submission(50)).await.unwrap();
    admin.cancel_job(id.as_str()).await.unwrap();

    let fetched = jobs.get(id.as_str()).await.unwrap();
    assert_eq!(fetched.status, JobStatus::Failed);

    let pending = store.range_by_score(keys::PENDING_SET, i64::MIN, i64::MAX, true, None).await.unwrap();
    assert!(pending.is_empty());

    let snap = snapshot.build().await.unwrap();
    assert!(snap.jobs.pending.is_empty());
    assert_eq!(snap.jobs.failed.len(), 1);

    // Idempotence: cancelling a terminal job again is rejected, not silently
    // repeated (§8 invariant on terminal absorption).
    let err = admin.cancel_job(id.as_str()).await.unwrap_err();
    assert!(matches!(err, jobmux_engine::EngineError::BadRequest(_)));
}

// S4 — a monitor attached before a submission receives the job_submitted
// event fanned out by the admission pipeline.
#[tokio::test]
async fn monitor_attached_before_submission_observes_the_job_submitted_event() {
    let store = FakeStore::new();
    let clock = Arc::new(FakeClock::new());
    let (admission, _admin, _jobs, _snapshot, registry) = harness(store, clock);

    let mut monitor = registry.attach_monitor();

    let id = admission.submit(submission(50)).await.unwrap();

    let frame = tokio::time::timeout(Duration::from_millis(200), monitor.frames.recv())
        .await
        .expect("monitor should receive a frame promptly")
        .expect("monitor channel should still be open");

    let parsed: serde_json::Value = serde_json::from_str(&frame).unwrap();
    assert_eq!(parsed["type"], "job_submitted");
    assert_eq!(parsed["job_id"], id.as_str());
}

// S5 — an assigned job whose worker heartbeat has expired is swept back to
// pending, and the snapshot reflects the move.
#[tokio::test]
async fn orphan_sweep_returns_a_stale_assignment_to_pending_and_updates_the_snapshot() {
    let store = FakeStore::new();
    let clock = Arc::new(FakeClock::at_millis(2 * 60 * 60 * 1000));
    let (_admission, admin, _jobs, snapshot, _registry) = harness(store.clone(), Arc::clone(&clock));

    store
        .put_hash_fields(
            &keys::job_key("job-stale"),
            &[
                ("id", "job-stale"),
                ("service_required", "render"),
                ("priority", "50"),
                ("created_at", "2026-01-01T00:00:00Z"),
                ("status", "in_progress"),
                ("worker_id", "w-gone"),
                ("started_at", "2026-01-01T00:00:00Z"),
            ],
        )
        .await
        .unwrap();

    let before = snapshot.build().await.unwrap();
    assert_eq!(before.jobs.active.len(), 1);

    let result = admin
        .cleanup(CleanupOptions {
            cleanup_orphaned_jobs: true,
            max_job_age_minutes: Some(30),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(result.jobs_cleaned, 1);

    let after = snapshot.build().await.unwrap();
    assert!(after.jobs.active.is_empty());
    assert_eq!(after.jobs.pending.len(), 1);
}

// S6 — a complete_job notification is held back for the completion delay
// before it reaches a monitor, so any trailing progress updates on the
// same channel are not outraced by the terminal event.
#[tokio::test]
async fn complete_job_notification_reaches_the_monitor_only_after_the_completion_delay() {
    let store = FakeStore::new();
    let fanout_registry = Arc::new(ConnectionRegistry::new(None));
    let fanout = Arc::new(FanOutEngine::new(Arc::clone(&fanout_registry)));
    let admin = Arc::new(AdminReconciler::new(Arc::new(store.clone()), Arc::clone(&fanout), Arc::new(FakeClock::new())));

    let mut monitor = fanout_registry.attach_monitor();

    let mut bus = EventBus::new(
        Box::new(store.subscriber()),
        Arc::new(store.clone()),
        Arc::clone(&fanout),
        admin,
        Arc::new(FakeClock::new()),
    );
    bus.subscribe_all().await.unwrap();
    tokio::spawn(async move {
        let _ = bus.run().await;
    });

    store
        .publish(keys::channels::COMPLETE_JOB, &serde_json::json!({"job_id": "job-1"}).to_string())
        .await
        .unwrap();

    let too_soon = tokio::time::timeout(Duration::from_millis(30), monitor.frames.recv()).await;
    assert!(too_soon.is_err(), "complete_job must not reach the monitor before the completion delay elapses");

    let frame = tokio::time::timeout(Duration::from_millis(400), monitor.frames.recv())
        .await
        .expect("complete_job should reach the monitor once the completion delay elapses")
        .expect("monitor channel should still be open");
    assert!(frame.contains("complete_job"));
    assert!(frame.contains("job-1"));
}

// §8 — rejecting an oversized payload at admission leaves no trace in the
// pending set or the job hash.
#[tokio::test]
async fn oversized_submission_is_rejected_before_anything_is_persisted() {
    let store = FakeStore::new();
    let clock = Arc::new(FakeClock::new());
    let (admission, _admin, _jobs, _snapshot, _registry) = harness(store.clone(), clock);

    let huge = jobmux_core::JobSubmission {
        payload: serde_json::Value::String("x".repeat(jobmux_engine::MAX_PAYLOAD_BYTES + 1)),
        ..Default::default()
    };
    let err = admission.submit(huge).await.unwrap_err();
    assert!(matches!(err, jobmux_engine::EngineError::BadRequest(_)));

    let pending = store.range_by_score(keys::PENDING_SET, i64::MIN, i64::MAX, true, None).await.unwrap();
    assert!(pending.is_empty());
}
