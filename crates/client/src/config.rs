// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the lodge session client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Base URL of the marketplace backend.
    #[arg(long, default_value = "http://localhost:8081", env = "LODGE_API_URL")]
    pub api_url: String,

    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = 10_000, env = "LODGE_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: u64,

    /// Timeout for the token refresh call in milliseconds. Kept short so
    /// requests waiting on a stalled refresh fail over instead of hanging.
    #[arg(long, default_value_t = 5_000, env = "LODGE_REFRESH_TIMEOUT_MS")]
    pub refresh_timeout_ms: u64,
}

impl ClientConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }

    pub fn refresh_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }

    /// Full URL of the refresh endpoint.
    pub fn refresh_url(&self) -> String {
        format!("{}/auth/refresh", self.base_url())
    }
}
