// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the engine crate (§7): the Event Bus's `BusError`
//! (decode failures never reach this type — they are swallowed per §7 and
//! only logged) and `EngineError` for the Admission Pipeline and Admin
//! Reconciler, which do propagate store failures to their caller.

use jobmux_core::HashDecodeError;
use jobmux_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to decode stored record: {0}")]
    Decode(#[from] HashDecodeError),
}
