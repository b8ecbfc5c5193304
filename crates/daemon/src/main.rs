// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! jobmuxd
//!
//! Background process that fronts the shared store with HTTP/SSE/WebSocket
//! ingress: the Admission Pipeline, Event Bus, Fan-Out Engine, Snapshot
//! Builder, and Admin Reconciler all run inside this one process.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use jobmux_core::{Clock, IdGen, SystemClock, UuidIdGen};
use jobmux_daemon::{build_router, Config};
use jobmux_engine::{AdminReconciler, AdmissionPipeline, EventBus, FanOutEngine, JobQuery, SnapshotBuilder};
use jobmux_registry::ConnectionRegistry;
use jobmux_store::{RedisStore, RedisSubscriber, StoreAdapter};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();

    let config = Config::load();
    info!(bind = %config.bind_addr, store = %config.store_url, "starting jobmux gateway");

    // Three separate client roles, per the Store Adapter's own design note
    // (§5): primary command client, secondary read-back client, and a
    // dedicated subscription connection that never issues arbitrary
    // commands.
    let primary: Arc<dyn StoreAdapter> = Arc::new(RedisStore::connect(&config.store_url).await?);
    let readback: Arc<dyn StoreAdapter> = Arc::new(RedisStore::connect(&config.store_url).await?);
    let subscriber = Box::new(RedisSubscriber::connect(&config.store_url).await?);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let id_gen: Arc<dyn IdGen> = Arc::new(UuidIdGen);

    let registry = Arc::new(ConnectionRegistry::new(config.auth_secret.clone()));
    let fanout = Arc::new(FanOutEngine::new(Arc::clone(&registry)));
    let admission = Arc::new(AdmissionPipeline::new(
        Arc::clone(&primary),
        Arc::clone(&fanout),
        Arc::clone(&id_gen),
        Arc::clone(&clock),
    ));
    let admin = Arc::new(AdminReconciler::new(Arc::clone(&primary), Arc::clone(&fanout), Arc::clone(&clock)));
    let snapshot = Arc::new(SnapshotBuilder::new(Arc::clone(&primary), Arc::clone(&clock)));
    let jobs = Arc::new(JobQuery::new(Arc::clone(&primary)));

    let state = jobmux_daemon::AppState {
        store: Arc::clone(&primary),
        registry: Arc::clone(&registry),
        fanout: Arc::clone(&fanout),
        admission,
        admin: Arc::clone(&admin),
        snapshot,
        jobs,
        clock: Arc::clone(&clock),
        id_gen,
    };

    // Startup sequencing (§5): store connects, keyspace notification mask
    // is set, the bus subscribes, then the HTTP listener binds.
    let mut bus = EventBus::new(subscriber, readback, Arc::clone(&fanout), admin, Arc::clone(&clock));
    bus.subscribe_all().await?;
    let bus_handle = tokio::spawn(async move {
        if let Err(err) = bus.run().await {
            error!(error = %err, "event bus terminated");
        }
    });

    let app = build_router(state, config.cors_allowed_origins.as_deref());
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "gateway listening");
    println!("READY");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    // Graceful shutdown (§5): drain in-flight requests, close every live
    // connection with a final frame/close code, stop the event bus.
    registry.shutdown_all();
    bus_handle.abort();
    info!("gateway stopped");

    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(err) => {
            error!(error = %err, "failed to install SIGTERM handler");
            return;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(err) => {
            error!(error = %err, "failed to install SIGINT handler");
            return;
        }
    };
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }
}
