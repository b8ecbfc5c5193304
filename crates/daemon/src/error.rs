// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `GatewayError` (§7): the Ingress Surface's closed error hierarchy. Every
//! downstream crate's error type narrows to one of these four variants
//! here, and nowhere else in this workspace, since only this crate knows
//! about HTTP status codes and WS close codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jobmux_engine::EngineError;
use jobmux_registry::RegistryError;
use jobmux_store::StoreError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("auth failure")]
    AuthFailure,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl From<EngineError> for GatewayError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::BadRequest(msg) => GatewayError::BadRequest(msg),
            EngineError::NotFound(msg) => GatewayError::NotFound(msg),
            EngineError::Store(err) => GatewayError::Store(err),
            EngineError::Decode(err) => GatewayError::Store(StoreError::Protocol {
                key: String::new(),
                message: err.to_string(),
            }),
        }
    }
}

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AuthFailure => GatewayError::AuthFailure,
            RegistryError::NotFound(msg) => GatewayError::NotFound(msg),
            RegistryError::SendFailure(msg) => GatewayError::Store(StoreError::Unavailable(msg)),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            GatewayError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            GatewayError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            GatewayError::AuthFailure => (StatusCode::UNAUTHORIZED, "auth token mismatch".to_string()),
            GatewayError::Store(err) => {
                tracing::error!(error = %err, "store failure surfaced to caller");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };
        (status, Json(json!({"success": false, "error": message}))).into_response()
    }
}
