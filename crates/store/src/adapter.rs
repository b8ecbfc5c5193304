// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The typed facade over the shared store (§4.A). All operations are
//! idempotent save for `publish` and `add_to_sorted_set`, which have their
//! own well-defined semantics.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StoreError;

/// One entry of a pipelined batch of operations (§4.A `batch-pipeline`).
/// Executed as a single round trip; results come back in the same order,
/// each independently fallible.
#[derive(Debug, Clone)]
pub enum StoreOp {
    GetHash(String),
    Ttl(String),
    Exists(String),
}

/// The result of one [`StoreOp`].
#[derive(Debug, Clone)]
pub enum StoreValue {
    Hash(HashMap<String, String>),
    Ttl(Option<i64>),
    Exists(bool),
}

/// A page from a cursor-based SCAN (§4.A `SCAN cursor iteration`). A
/// `cursor` of `0` means the scan is complete.
#[derive(Debug, Clone)]
pub struct ScanPage {
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// Typed facade over hash, sorted-set, pub/sub, SCAN, and pipelined ops
/// (§4.A). Implemented by [`crate::redis_store::RedisStore`] in production
/// and [`crate::fake::FakeStore`] in tests.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, StoreError>;

    async fn put_hash_fields(
        &self,
        key: &str,
        fields: &[(&str, &str)],
    ) -> Result<(), StoreError>;

    async fn delete_key(&self, key: &str) -> Result<bool, StoreError>;

    /// Adds `member` to the sorted set at `key` with `score`, replacing any
    /// existing score for that member (standard ZADD semantics).
    async fn add_to_sorted_set(
        &self,
        key: &str,
        member: &str,
        score: i64,
    ) -> Result<(), StoreError>;

    async fn remove_from_sorted_set(&self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Returns members in `[min, max]` score order. `descending` selects
    /// highest-score-first iteration, as the pending set is consumed
    /// (§4.C). `limit` is `(offset, count)`.
    async fn range_by_score(
        &self,
        key: &str,
        min: i64,
        max: i64,
        descending: bool,
        limit: Option<(i64, i64)>,
    ) -> Result<Vec<String>, StoreError>;

    async fn scan(&self, cursor: u64, pattern: &str, count: u32) -> Result<ScanPage, StoreError>;

    /// Runs `ops` as a single round trip; each op's result or error comes
    /// back independently, in the same order they were submitted.
    async fn pipeline(&self, ops: &[StoreOp]) -> Result<Vec<Result<StoreValue, StoreError>>, StoreError>;

    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError>;

    /// Configures the store-side keyspace-notification mask (§4.B) to
    /// include keyspace, keyevent, string, and expired events.
    async fn configure_keyspace_notifications(&self) -> Result<(), StoreError>;

    async fn publish(&self, channel: &str, payload: &str) -> Result<i64, StoreError>;
}

/// A single message observed on a subscription connection (§4.A
/// `subscribe-to-channel`, `pattern-subscribe`).
#[derive(Debug, Clone)]
pub struct StoreMessage {
    /// The channel the message arrived on (for a pattern subscription,
    /// this is the concrete channel, not the pattern).
    pub channel: String,
    pub payload: String,
}

/// A dedicated subscription connection (§5: "Subscription connections MUST
/// NOT issue arbitrary commands; read-back uses a separate client").
#[async_trait]
pub trait StoreSubscriber: Send {
    async fn subscribe(&mut self, channels: &[&str]) -> Result<(), StoreError>;

    async fn psubscribe(&mut self, patterns: &[&str]) -> Result<(), StoreError>;

    /// Blocks until the next message arrives, or returns `None` if the
    /// subscription connection has been closed.
    async fn next_message(&mut self) -> Result<Option<StoreMessage>, StoreError>;
}
