// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for encoding/decoding the flat `field -> string` hashes
//! the store persists records as (§6.3). Workers write directly to
//! individual `job:{id}` fields (e.g. `HSET job:{id} status completed`),
//! which is what makes keyspace-notification read-back (§4.B) possible —
//! so records round-trip through plain string fields, not a single
//! serialized blob.

use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to decode hash field `{field}`: {message}")]
pub struct HashDecodeError {
    pub field: String,
    pub message: String,
}

impl HashDecodeError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn require<'a>(hash: &'a HashMap<String, String>, field: &str) -> Result<&'a str, HashDecodeError> {
    hash.get(field)
        .map(String::as_str)
        .ok_or_else(|| HashDecodeError::new(field, "missing required field"))
}

/// Decodes a closed-set enum field via its existing `serde(rename_all =
/// "snake_case")` `Deserialize` impl, so unknown values are rejected the
/// same way everywhere (§3's "closed enum... rejected at decode time").
pub fn require_enum<T: serde::de::DeserializeOwned>(
    hash: &HashMap<String, String>,
    field: &str,
) -> Result<T, HashDecodeError> {
    let raw = require(hash, field)?;
    serde_json::from_value(Value::String(raw.to_string()))
        .map_err(|e| HashDecodeError::new(field, e.to_string()))
}

pub fn opt_enum<T: serde::de::DeserializeOwned>(
    hash: &HashMap<String, String>,
    field: &str,
) -> Result<Option<T>, HashDecodeError> {
    match hash.get(field) {
        None => Ok(None),
        Some(raw) => serde_json::from_value(Value::String(raw.clone()))
            .map(Some)
            .map_err(|e| HashDecodeError::new(field, e.to_string())),
    }
}

pub fn opt_string(hash: &HashMap<String, String>, field: &str) -> Option<String> {
    hash.get(field).cloned()
}

pub fn opt_i64(hash: &HashMap<String, String>, field: &str) -> Result<Option<i64>, HashDecodeError> {
    match hash.get(field) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|e| HashDecodeError::new(field, e.to_string())),
    }
}

pub fn opt_u32(hash: &HashMap<String, String>, field: &str) -> Result<Option<u32>, HashDecodeError> {
    match hash.get(field) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u32>()
            .map(Some)
            .map_err(|e| HashDecodeError::new(field, e.to_string())),
    }
}

pub fn opt_u64(hash: &HashMap<String, String>, field: &str) -> Result<Option<u64>, HashDecodeError> {
    match hash.get(field) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u64>()
            .map(Some)
            .map_err(|e| HashDecodeError::new(field, e.to_string())),
    }
}

pub fn opt_f64(hash: &HashMap<String, String>, field: &str) -> Result<Option<f64>, HashDecodeError> {
    match hash.get(field) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|e| HashDecodeError::new(field, e.to_string())),
    }
}

pub fn opt_json(hash: &HashMap<String, String>, field: &str) -> Result<Option<Value>, HashDecodeError> {
    match hash.get(field) {
        None => Ok(None),
        Some(raw) => serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| HashDecodeError::new(field, e.to_string())),
    }
}

pub fn opt_string_list(hash: &HashMap<String, String>, field: &str) -> Result<Option<Vec<String>>, HashDecodeError> {
    match hash.get(field) {
        None => Ok(None),
        Some(raw) => serde_json::from_str(raw)
            .map(Some)
            .map_err(|e| HashDecodeError::new(field, e.to_string())),
    }
}
