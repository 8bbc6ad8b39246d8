// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential handling: in-memory token store, de-duplicated refresh, and
//! best-effort propagation to sibling contexts of the same session.
//!
//! The access token lives only in memory for the lifetime of the context.
//! Durable storage carries a single boolean "user explicitly logged out"
//! marker, never the token itself, so state files cannot replay a session.

pub mod broadcast;
pub mod refresh;
pub mod store;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Logical name of the cross-context channel.
pub const CHANNEL_NAME: &str = "auth-tokens";

/// Durable-storage key for the explicit-logout marker.
pub const LOGOUT_MARKER_KEY: &str = "clientLoggedOut";

/// Messages exchanged between sibling contexts of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SyncMessage {
    /// A sibling obtained a fresh access token.
    #[serde(rename = "NEW_ACCESS_TOKEN")]
    NewAccessToken { token: String },
    /// A sibling logged out explicitly (the durable marker was set).
    #[serde(rename = "LOGGED_OUT")]
    LoggedOut,
}

/// Session lifecycle events observable by the application layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A fresh access token is in the store.
    Refreshed,
    /// The token was dropped after a failed silent refresh.
    Cleared,
    /// The user logged out explicitly, here or in a sibling context.
    LoggedOut,
}

/// Resolve the state directory for lodge data.
///
/// Checks `LODGE_STATE_DIR`, then `$XDG_STATE_HOME/lodge`,
/// then `$HOME/.local/state/lodge`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("LODGE_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("lodge");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/lodge");
    }
    PathBuf::from(".lodge")
}
