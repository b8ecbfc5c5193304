// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed implementation of [`StoreAdapter`] and [`StoreSubscriber`]
//! (§4.A, §5). Command traffic goes through a multiplexed
//! [`redis::aio::ConnectionManager`] so the three client roles (primary
//! command, secondary command for read-back, dedicated subscription) never
//! share a connection.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, PubSub};
use redis::{AsyncCommands, Client, FromRedisValue, Value};

use crate::adapter::{ScanPage, StoreAdapter, StoreMessage, StoreOp, StoreSubscriber, StoreValue};
use crate::error::StoreError;

/// A command-role client (primary or secondary, per §5). Cheap to clone —
/// [`ConnectionManager`] multiplexes internally and reconnects on failure.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl StoreAdapter for RedisStore {
    async fn get_hash(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        let mut conn = self.conn.clone();
        let map: HashMap<String, String> = conn.hgetall(key).await?;
        Ok(map)
    }

    async fn put_hash_fields(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.hset_multiple(key, fields).await?;
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let n: i64 = conn.del(key).await?;
        Ok(n > 0)
    }

    async fn add_to_sorted_set(&self, key: &str, member: &str, score: i64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = conn.zadd(key, member, score).await?;
        Ok(())
    }

    async fn remove_from_sorted_set(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let n: i64 = conn.zrem(key, member).await?;
        Ok(n > 0)
    }

    async fn range_by_score(
        &self,
        key: &str,
        min: i64,
        max: i64,
        descending: bool,
        limit: Option<(i64, i64)>,
    ) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = match (descending, limit) {
            (true, Some((offset, count))) => {
                conn.zrevrangebyscore_limit(key, max, min, offset, count).await?
            }
            (true, None) => conn.zrevrangebyscore(key, max, min).await?,
            (false, Some((offset, count))) => {
                conn.zrangebyscore_limit(key, min, max, offset, count).await?
            }
            (false, None) => conn.zrangebyscore(key, min, max).await?,
        };
        Ok(members)
    }

    async fn scan(&self, cursor: u64, pattern: &str, count: u32) -> Result<ScanPage, StoreError> {
        let mut conn = self.conn.clone();
        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query_async(&mut conn)
            .await?;
        Ok(ScanPage {
            cursor: next_cursor,
            keys,
        })
    }

    async fn pipeline(
        &self,
        ops: &[StoreOp],
    ) -> Result<Vec<Result<StoreValue, StoreError>>, StoreError> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for op in ops {
            match op {
                StoreOp::GetHash(key) => {
                    pipe.cmd("HGETALL").arg(key);
                }
                StoreOp::Ttl(key) => {
                    pipe.cmd("TTL").arg(key);
                }
                StoreOp::Exists(key) => {
                    pipe.cmd("EXISTS").arg(key);
                }
            }
        }
        let replies: Vec<Value> = pipe.query_async(&mut conn).await?;
        Ok(ops
            .iter()
            .zip(replies)
            .map(|(op, reply)| decode_pipeline_reply(op, reply))
            .collect())
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn.ttl(key).await?;
        Ok(if ttl >= 0 { Some(ttl) } else { None })
    }

    async fn configure_keyspace_notifications(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        // K: keyspace events, E: keyevent events, g: generic, $: string, x: expired.
        let _: () = redis::cmd("CONFIG")
            .arg("SET")
            .arg("notify-keyspace-events")
            .arg("KEAgx$")
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let n: i64 = conn.publish(channel, payload).await?;
        Ok(n)
    }
}

fn decode_pipeline_reply(op: &StoreOp, value: Value) -> Result<StoreValue, StoreError> {
    let key_for_error = match op {
        StoreOp::GetHash(k) | StoreOp::Ttl(k) | StoreOp::Exists(k) => k.clone(),
    };
    let wrap = |e: redis::RedisError| StoreError::Protocol {
        key: key_for_error.clone(),
        message: e.to_string(),
    };
    match op {
        StoreOp::GetHash(_) => {
            HashMap::<String, String>::from_redis_value(&value).map(StoreValue::Hash).map_err(wrap)
        }
        StoreOp::Ttl(_) => {
            let ttl = i64::from_redis_value(&value).map_err(wrap)?;
            Ok(StoreValue::Ttl(if ttl >= 0 { Some(ttl) } else { None }))
        }
        StoreOp::Exists(_) => {
            let n = i64::from_redis_value(&value).map_err(wrap)?;
            Ok(StoreValue::Exists(n > 0))
        }
    }
}

/// The dedicated subscription connection (§5). Never issues arbitrary
/// commands; read-back after a keyspace notification goes through a
/// separate [`RedisStore`] command client instead.
pub struct RedisSubscriber {
    pubsub: PubSub,
}

impl RedisSubscriber {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let pubsub = client.get_async_pubsub().await?;
        Ok(Self { pubsub })
    }
}

#[async_trait]
impl StoreSubscriber for RedisSubscriber {
    async fn subscribe(&mut self, channels: &[&str]) -> Result<(), StoreError> {
        for channel in channels {
            self.pubsub.subscribe(*channel).await?;
        }
        Ok(())
    }

    async fn psubscribe(&mut self, patterns: &[&str]) -> Result<(), StoreError> {
        for pattern in patterns {
            self.pubsub.psubscribe(*pattern).await?;
        }
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<StoreMessage>, StoreError> {
        use futures::StreamExt;
        match self.pubsub.on_message().next().await {
            Some(msg) => {
                let channel = msg.get_channel_name().to_string();
                let payload: String = msg.get_payload()?;
                Ok(Some(StoreMessage { channel, payload }))
            }
            None => Ok(None),
        }
    }
}
