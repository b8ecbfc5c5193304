// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors from the Connection Registry (§4.D, §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("auth token mismatch")]
    AuthFailure,

    #[error("connection not found: {0}")]
    NotFound(String),

    #[error("send failed: {0}")]
    SendFailure(String),
}
