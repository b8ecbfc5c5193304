// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error type for the Store Adapter (§4.A, §7). Failures here are never
//! swallowed at this layer; callers decide whether to retry, surface 500,
//! or surface 404.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed store reply for {key}: {message}")]
    Protocol { key: String, message: String },

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("subscription error: {0}")]
    Subscription(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            StoreError::Unavailable(err.to_string())
        } else {
            StoreError::Protocol {
                key: String::new(),
                message: err.to_string(),
            }
        }
    }
}
