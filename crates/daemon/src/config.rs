// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration (§6.4): environment-first, read once at startup,
//! continuing this workspace's `Config::load()` convention rather than a
//! config file or CLI flag parser.

use std::net::SocketAddr;

const DEFAULT_STORE_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_AUTH_SECRET: &str = "jobmux-dev-secret";

#[derive(Debug, Clone)]
pub struct Config {
    pub store_url: String,
    pub bind_addr: SocketAddr,
    /// `None` disables auth entirely (§4.D); set `JOBMUX_AUTH_TOKEN=""` to
    /// opt out explicitly rather than relying on an unset variable.
    pub auth_secret: Option<String>,
    pub cors_allowed_origins: Option<Vec<String>>,
}

impl Config {
    /// Reads `JOBMUX_REDIS_URL` (falling back to `REDIS_URL`), `JOBMUX_PORT`
    /// (falling back to `PORT`), `JOBMUX_AUTH_TOKEN`, and
    /// `JOBMUX_CORS_ORIGINS` from the environment.
    pub fn load() -> Self {
        let store_url = std::env::var("JOBMUX_REDIS_URL")
            .or_else(|_| std::env::var("REDIS_URL"))
            .unwrap_or_else(|_| DEFAULT_STORE_URL.to_string());

        let port: u16 = std::env::var("JOBMUX_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let bind_addr: SocketAddr = ([0, 0, 0, 0], port).into();

        let auth_secret = match std::env::var("JOBMUX_AUTH_TOKEN") {
            Ok(value) if value.is_empty() => None,
            Ok(value) => Some(value),
            Err(_) => Some(DEFAULT_AUTH_SECRET.to_string()),
        };

        let cors_allowed_origins = std::env::var("JOBMUX_CORS_ORIGINS").ok().map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        });

        Self {
            store_url,
            bind_addr,
            auth_secret,
            cors_allowed_origins,
        }
    }
}
