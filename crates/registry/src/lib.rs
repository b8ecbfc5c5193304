// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! jobmux-registry: the stateful Connection Registry (§3.4, §4.D) — the
//! sole owner of every live SSE/duplex/monitor connection record and the
//! job-to-submitter mapping.

pub mod connection;
pub mod error;
#[allow(clippy::module_inception)]
pub mod registry;

pub use connection::{ClientDuplex, ClientNamed, ClientSse, Connection, Monitor};
pub use error::RegistryError;
pub use registry::{AttachHandle, ConnectionRegistry, RegistryCounts};
