// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plain request/response HTTP routes (§6.1). Each handler parses its
//! input, delegates to the engine crate, and serializes the result — no
//! business logic lives at this layer.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use jobmux_core::{Job, JobSubmission};
use jobmux_engine::{CleanupOptions, CleanupResult, JobListOptions, MachineDeletionResult};
use serde::Deserialize;
use serde_json::json;

use crate::error::GatewayError;
use crate::state::AppState;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

pub async fn submit_job(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse, GatewayError> {
    let submission: JobSubmission =
        serde_json::from_slice(&body).map_err(|e| GatewayError::BadRequest(format!("invalid submission payload: {e}")))?;
    let job_id = state.admission.submit(submission).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "job_id": job_id.as_str(),
            "timestamp": state.clock.now_ms(),
        })),
    ))
}

pub async fn get_job(State(state): State<AppState>, Path(job_id): Path<String>) -> Result<Json<Job>, GatewayError> {
    Ok(Json(state.jobs.get(&job_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    status: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Vec<Job>>, GatewayError> {
    let jobs = state
        .jobs
        .list(JobListOptions {
            status: query.status,
            limit: query.limit,
            offset: query.offset,
        })
        .await?;
    Ok(Json(jobs))
}

#[derive(Debug, Default, Deserialize)]
pub struct CleanupRequest {
    #[serde(default)]
    reset_workers: bool,
    #[serde(default)]
    cleanup_orphaned_jobs: bool,
    #[serde(default)]
    reset_specific_worker: Option<String>,
    #[serde(default)]
    max_job_age_minutes: Option<i64>,
}

pub async fn cleanup(State(state): State<AppState>, body: Bytes) -> Result<Json<CleanupResult>, GatewayError> {
    let request: CleanupRequest = if body.is_empty() {
        CleanupRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| GatewayError::BadRequest(format!("invalid cleanup request: {e}")))?
    };
    let options = CleanupOptions {
        reset_workers: request.reset_workers,
        cleanup_orphaned_jobs: request.cleanup_orphaned_jobs,
        reset_specific_worker: request.reset_specific_worker,
        max_job_age_minutes: request.max_job_age_minutes,
    };
    Ok(Json(state.admin.cleanup(options).await?))
}

pub async fn delete_machine(
    State(state): State<AppState>,
    Path(machine_id): Path<String>,
) -> Result<Json<MachineDeletionResult>, GatewayError> {
    Ok(Json(state.admin.delete_machine(&machine_id).await?))
}
