// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic in-memory [`StoreAdapter`]/[`StoreSubscriber`] fake.
//!
//! This is this workspace's own test support, not the mock/test harness
//! apparatus the specification excludes from scope (§1): it stands in for
//! the shared store in unit and integration tests so the gateway's own
//! logic can be exercised without a live Redis.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::adapter::{ScanPage, StoreAdapter, StoreMessage, StoreOp, StoreSubscriber, StoreValue};
use crate::error::StoreError;

struct FakeState {
    hashes: HashMap<String, HashMap<String, String>>,
    sorted_sets: HashMap<String, BTreeMap<String, i64>>,
    expirations: HashMap<String, Instant>,
}

/// Shared in-memory store. Clone to hand a second "client role" to
/// something that needs its own handle (§5); all clones see the same
/// underlying state.
#[derive(Clone)]
pub struct FakeStore {
    state: Arc<RwLock<FakeState>>,
    publisher: broadcast::Sender<(String, String)>,
}

impl Default for FakeStore {
    fn default() -> Self {
        let (publisher, _) = broadcast::channel(1024);
        Self {
            state: Arc::new(RwLock::new(FakeState {
                hashes: HashMap::new(),
                sorted_sets: HashMap::new(),
                expirations: HashMap::new(),
            })),
            publisher,
        }
    }
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber(&self) -> FakeSubscriber {
        FakeSubscriber {
            receiver: self.publisher.subscribe(),
            channels: Vec::new(),
            patterns: Vec::new(),
        }
    }

    /// Test helper: marks `key` present with a TTL, as a worker heartbeat
    /// would be (§3.2). The key carries no hash content of its own.
    pub fn set_presence_with_ttl(&self, key: &str, ttl_secs: i64) {
        let mut state = self.state.write();
        state.hashes.entry(key.to_string()).or_default();
        state
            .expirations
            .insert(key.to_string(), Instant::now() + Duration::from_secs(ttl_secs.max(0) as u64));
    }

    /// Test helper: simulates a heartbeat key having already expired
    /// (§8 S5 — orphan sweep depends on the absence of this key).
    pub fn expire_now(&self, key: &str) {
        let mut state = self.state.write();
        state.hashes.remove(key);
        state.expirations.remove(key);
    }

    fn sweep_expired(state: &mut FakeState) {
        let now = Instant::now();
        let expired: Vec<String> = state
            .expirations
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            state.hashes.remove(&key);
            state.expirations.remove(&key);
        }
    }
}

#[async_trait]
impl StoreAdapter for FakeStore {
    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut state = self.state.write();
        Self::sweep_expired(&mut state);
        Ok(state.hashes.get(key).cloned().unwrap_or_default())
    }

    async fn put_hash_fields(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let entry = state.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            entry.insert((*field).to_string(), (*value).to_string());
        }
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write();
        let removed_hash = state.hashes.remove(key).is_some();
        let removed_set = state.sorted_sets.remove(key).is_some();
        state.expirations.remove(key);
        Ok(removed_hash || removed_set)
    }

    async fn add_to_sorted_set(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state
            .sorted_sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn remove_from_sorted_set(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut state = self.state.write();
        Ok(state
            .sorted_sets
            .get_mut(key)
            .map(|set| set.remove(member).is_some())
            .unwrap_or(false))
    }

    async fn range_by_score(
        &self,
        key: &str,
        min: i64,
        max: i64,
        descending: bool,
        limit: Option<(i64, i64)>,
    ) -> Result<Vec<String>, StoreError> {
        let state = self.state.read();
        let Some(set) = state.sorted_sets.get(key) else {
            return Ok(Vec::new());
        };
        let mut members: Vec<(&String, &i64)> =
            set.iter().filter(|(_, score)| **score >= min && **score <= max).collect();
        // Ties break on member name for determinism (the spec leaves residual
        // ties to "an arbitrary but stable order chosen by the store").
        members.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));
        if descending {
            members.reverse();
        }
        let mut result: Vec<String> = members.into_iter().map(|(member, _)| member.clone()).collect();
        if let Some((offset, count)) = limit {
            let offset = offset.max(0) as usize;
            let count = if count < 0 { usize::MAX } else { count as usize };
            result = result.into_iter().skip(offset).take(count).collect();
        }
        Ok(result)
    }

    async fn scan(&self, cursor: u64, pattern: &str, _count: u32) -> Result<ScanPage, StoreError> {
        let mut state = self.state.write();
        Self::sweep_expired(&mut state);
        // The fake always returns every matching key in one page and
        // reports cursor 0 (scan complete), which is a valid SCAN
        // trajectory even though real SCAN may paginate.
        if cursor != 0 {
            return Ok(ScanPage { cursor: 0, keys: Vec::new() });
        }
        let keys = state
            .hashes
            .keys()
            .chain(state.sorted_sets.keys())
            .filter(|key| pattern_matches(pattern, key))
            .cloned()
            .collect();
        Ok(ScanPage { cursor: 0, keys })
    }

    async fn pipeline(
        &self,
        ops: &[StoreOp],
    ) -> Result<Vec<Result<StoreValue, StoreError>>, StoreError> {
        let mut results = Vec::with_capacity(ops.len());
        for op in ops {
            let value = match op {
                StoreOp::GetHash(key) => Ok(StoreValue::Hash(self.get_hash(key).await?)),
                StoreOp::Ttl(key) => Ok(StoreValue::Ttl(self.ttl(key).await?)),
                StoreOp::Exists(key) => {
                    let state = self.state.read();
                    Ok(StoreValue::Exists(
                        state.hashes.contains_key(key) || state.sorted_sets.contains_key(key),
                    ))
                }
            };
            results.push(value);
        }
        Ok(results)
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut state = self.state.write();
        Self::sweep_expired(&mut state);
        Ok(state.expirations.get(key).map(|deadline| {
            deadline.saturating_duration_since(Instant::now()).as_secs() as i64
        }))
    }

    async fn configure_keyspace_notifications(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<i64, StoreError> {
        let receivers = self.publisher.send((channel.to_string(), payload.to_string())).unwrap_or(0);
        Ok(receivers as i64)
    }
}

/// Matches the single-`*`-wildcard patterns this workspace actually uses
/// (`connector_status:*`, `__keyspace@0__:job:*`, ...). Not a general glob.
fn pattern_matches(pattern: &str, candidate: &str) -> bool {
    match pattern.find('*') {
        Some(idx) => {
            let prefix = &pattern[..idx];
            let suffix = &pattern[idx + 1..];
            candidate.len() >= prefix.len() + suffix.len()
                && candidate.starts_with(prefix)
                && candidate.ends_with(suffix)
        }
        None => pattern == candidate,
    }
}

/// In-memory subscription handle backed by a broadcast channel.
pub struct FakeSubscriber {
    receiver: broadcast::Receiver<(String, String)>,
    channels: Vec<String>,
    patterns: Vec<String>,
}

#[async_trait]
impl StoreSubscriber for FakeSubscriber {
    async fn subscribe(&mut self, channels: &[&str]) -> Result<(), StoreError> {
        self.channels.extend(channels.iter().map(|c| c.to_string()));
        Ok(())
    }

    async fn psubscribe(&mut self, patterns: &[&str]) -> Result<(), StoreError> {
        self.patterns.extend(patterns.iter().map(|p| p.to_string()));
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<StoreMessage>, StoreError> {
        loop {
            match self.receiver.recv().await {
                Ok((channel, payload)) => {
                    let matches = self.channels.iter().any(|c| c == &channel)
                        || self.patterns.iter().any(|p| pattern_matches(p, &channel));
                    if matches {
                        return Ok(Some(StoreMessage { channel, payload }));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_round_trips_through_fields() {
        let store = FakeStore::new();
        store.put_hash_fields("job:1", &[("status", "pending")]).await.unwrap();
        let hash = store.get_hash("job:1").await.unwrap();
        assert_eq!(hash.get("status").map(String::as_str), Some("pending"));
    }

    #[tokio::test]
    async fn sorted_set_range_orders_by_score_then_descending() {
        let store = FakeStore::new();
        store.add_to_sorted_set("jobs:pending", "a", 10).await.unwrap();
        store.add_to_sorted_set("jobs:pending", "b", 20).await.unwrap();
        let members = store
            .range_by_score("jobs:pending", i64::MIN, i64::MAX, true, None)
            .await
            .unwrap();
        assert_eq!(members, vec!["b".to_string(), "a".to_string()]);
    }

    #[tokio::test]
    async fn heartbeat_presence_expires_and_disappears_from_scan() {
        let store = FakeStore::new();
        store.set_presence_with_ttl("worker:w-1:heartbeat", 60);
        let page = store.scan(0, "worker:*:heartbeat", 100).await.unwrap();
        assert_eq!(page.keys, vec!["worker:w-1:heartbeat".to_string()]);

        store.expire_now("worker:w-1:heartbeat");
        let page = store.scan(0, "worker:*:heartbeat", 100).await.unwrap();
        assert!(page.keys.is_empty());
    }

    #[tokio::test]
    async fn publish_and_subscribe_round_trip_matching_pattern() {
        let store = FakeStore::new();
        let mut subscriber = store.subscriber();
        subscriber.psubscribe(&["connector_status:*"]).await.unwrap();

        store.publish("connector_status:comfyui", "{\"status\":\"up\"}").await.unwrap();
        let msg = subscriber.next_message().await.unwrap().unwrap();
        assert_eq!(msg.channel, "connector_status:comfyui");
    }
}
