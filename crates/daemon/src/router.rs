// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Route assembly (§6.1, §6.2): wires the HTTP, SSE, and WebSocket handlers
//! onto one axum `Router`, with the body-size ceiling, CORS, and request
//! tracing layers applied once here rather than per-handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::HeaderValue;
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::Router;
use jobmux_engine::MAX_PAYLOAD_BYTES;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::ws::duplex::handle_legacy_socket;
use crate::ws::TokenQuery;
use crate::{http, sse, ws};

/// Extra slack over the admission pipeline's own payload-size check, so an
/// oversized body reaches the handler and comes back as a 400 rather than
/// being cut off early as a 413.
const BODY_LIMIT: usize = MAX_PAYLOAD_BYTES + 4096;

pub fn build_router(state: AppState, cors_allowed_origins: Option<&[String]>) -> Router {
    let cors = cors_layer(cors_allowed_origins);

    Router::new()
        .route("/health", get(http::health))
        .route("/api/jobs", post(http::submit_job).get(http::list_jobs))
        .route("/api/jobs/:id", get(http::get_job))
        .route("/api/jobs/:id/progress", get(sse::job_progress))
        .route("/api/events/monitor", get(sse::monitor_stream))
        .route("/api/cleanup", post(http::cleanup))
        .route("/api/machines/:id", delete(http::delete_machine))
        .route("/ws/monitor/:id", get(ws::monitor::monitor_ws))
        .route("/ws/client/:id", get(ws::named::named_ws))
        .fallback(legacy_fallback)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// `/ws/monitor/:id` and `/ws/client/:id` are matched explicitly above;
/// every other path that attempts a WebSocket upgrade lands here as the
/// legacy duplex connection (§6.2).
async fn legacy_fallback(ws: WebSocketUpgrade, State(state): State<AppState>, Query(params): Query<TokenQuery>) -> Response {
    ws.on_upgrade(move |socket| handle_legacy_socket(socket, state, params.token))
}

fn cors_layer(origins: Option<&[String]>) -> CorsLayer {
    match origins {
        Some(list) if !list.is_empty() => {
            let parsed: Vec<HeaderValue> = list.iter().filter_map(|origin| origin.parse().ok()).collect();
            CorsLayer::new().allow_origin(parsed).allow_methods(Any).allow_headers(Any)
        }
        _ => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    }
}
