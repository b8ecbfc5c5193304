// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide state (§9): every component a route handler delegates to,
//! held behind one cloneable structure so axum's `State` extractor can hand
//! it to every handler without a global.

use std::sync::Arc;

use jobmux_core::{Clock, IdGen};
use jobmux_engine::{AdminReconciler, AdmissionPipeline, FanOutEngine, JobQuery, SnapshotBuilder};
use jobmux_registry::ConnectionRegistry;
use jobmux_store::StoreAdapter;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StoreAdapter>,
    pub registry: Arc<ConnectionRegistry>,
    pub fanout: Arc<FanOutEngine>,
    pub admission: Arc<AdmissionPipeline>,
    pub admin: Arc<AdminReconciler>,
    pub snapshot: Arc<SnapshotBuilder>,
    pub jobs: Arc<JobQuery>,
    pub clock: Arc<dyn Clock>,
    pub id_gen: Arc<dyn IdGen>,
}
