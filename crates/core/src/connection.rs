// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Connection variant discriminant shared between the registry and the
//! fan-out routing rules (§3.4, §4.E). The connection records themselves,
//! and the transport they wrap, live in `jobmux-registry`; this crate only
//! names the shape every variant agrees on.

/// Which of the four connection flavors a registry entry is (§3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    ClientSse,
    ClientDuplex,
    ClientNamed,
    Monitor,
}

impl std::fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionKind::ClientSse => "client_sse",
            ConnectionKind::ClientDuplex => "client_duplex",
            ConnectionKind::ClientNamed => "client_named",
            ConnectionKind::Monitor => "monitor",
        };
        write!(f, "{s}")
    }
}
