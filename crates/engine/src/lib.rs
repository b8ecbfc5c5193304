// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jobmux-engine: the store-facing core of the job queue gateway — the
//! Event Bus, Fan-Out Engine, Snapshot Builder, Admission Pipeline, and
//! Admin Reconciler. `jobmux-daemon` is the thin HTTP/WS shell around this
//! crate.

pub mod admin;
pub mod admission;
pub mod bus;
pub mod decode;
pub mod error;
pub mod fanout;
pub mod query;
pub mod snapshot;

pub use admin::{AdminReconciler, CleanupOptions, CleanupResult, MachineDeletionResult};
pub use admission::{AdmissionPipeline, MAX_PAYLOAD_BYTES};
pub use bus::EventBus;
pub use error::{BusError, EngineError};
pub use fanout::FanOutEngine;
pub use query::{JobListOptions, JobQuery};
pub use snapshot::{JobBuckets, MachineSnapshot, Snapshot, SnapshotBuilder, SystemStats, WorkerSnapshot};
