// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jobmux-store: the typed Store Adapter facade (§4.A) over the shared
//! hash/sorted-set/pub-sub key/value store, plus the key/channel schema
//! (§6.3) every other crate in this workspace agrees on.

pub mod adapter;
pub mod error;
pub mod fake;
pub mod keys;
pub mod redis_store;

pub use adapter::{ScanPage, StoreAdapter, StoreMessage, StoreOp, StoreSubscriber, StoreValue};
pub use error::StoreError;
pub use fake::{FakeStore, FakeSubscriber};
pub use redis_store::{RedisStore, RedisSubscriber};
