// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID generation abstractions shared by every typed identifier in this workspace.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `Display`, `From<String>`, `From<&str>`,
/// `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>` implementations.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Generates process-unique opaque identifiers for jobs, jobs-to-submitter
/// mappings, and anything else that needs an externally-visible id.
pub trait IdGen: Send + Sync {
    fn next(&self) -> String;
}

/// UUIDv4-based generator used in production.
#[derive(Clone, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn next(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Sequential generator for deterministic tests.
#[derive(Clone)]
pub struct SequentialIdGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialIdGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl IdGen for SequentialIdGen {
    fn next(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{n}", self.prefix)
    }
}

define_id! {
    /// Process-unique opaque identifier assigned to a job on admission (§3.1).
    pub struct JobId;
}

define_id! {
    /// Externally-chosen id a ClientNamed connection identifies itself with.
    pub struct ClientId;
}

/// Process-assigned identifier for a live Connection Registry entry (§3.4).
///
/// Unlike the other ids this never crosses a process boundary, so a
/// monotonic counter is sufficient and avoids a UUID allocation per connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Issues monotonically increasing [`ConnectionId`]s for one process lifetime.
#[derive(Default)]
pub struct ConnectionIdGen(AtomicU64);

impl ConnectionIdGen {
    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.0.fetch_add(1, Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_id_gen_produces_unique_increasing_ids() {
        let gen = SequentialIdGen::new("job");
        assert_eq!(gen.next(), "job-1");
        assert_eq!(gen.next(), "job-2");
    }

    #[test]
    fn connection_id_gen_is_monotonic() {
        let gen = ConnectionIdGen::default();
        let a = gen.next();
        let b = gen.next();
        assert!(b.0 > a.0);
    }

    define_id! {
        pub struct TestId;
    }

    #[test]
    fn define_id_equality_against_str() {
        let id = TestId::new("abc");
        assert_eq!(id, "abc");
        assert_eq!(id.as_str(), "abc");
    }
}
