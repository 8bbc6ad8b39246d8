// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort token propagation between sibling contexts.
//!
//! Sibling execution contexts of one session share a [`ContextBus`] named
//! `auth-tokens`. Delivery is best-effort only: a context that misses a
//! message simply performs its own refresh on its next 401, which degrades
//! gracefully instead of breaking correctness.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::credential::store::CredentialStore;
use crate::credential::{SyncMessage, CHANNEL_NAME};

/// Channel connecting sibling contexts. Clone one handle per sibling.
#[derive(Debug, Clone)]
pub struct ContextBus {
    name: String,
    tx: broadcast::Sender<SyncMessage>,
}

impl ContextBus {
    pub fn new() -> Self {
        Self::named(CHANNEL_NAME)
    }

    pub fn named(name: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { name: name.into(), tx }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncMessage> {
        self.tx.subscribe()
    }

    /// Send a message to all current subscribers. Returns how many
    /// receivers saw it (0 when no sibling is listening).
    pub fn publish(&self, msg: SyncMessage) -> usize {
        self.tx.send(msg).unwrap_or(0)
    }
}

impl Default for ContextBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-context handle: announces local credential changes and applies
/// changes announced by siblings.
///
/// Constructed without a bus it degrades to single-context behavior —
/// every operation becomes a silent no-op.
pub struct SessionBroadcaster {
    bus: Option<ContextBus>,
}

impl SessionBroadcaster {
    pub fn new(bus: Option<ContextBus>) -> Self {
        Self { bus }
    }

    /// Best-effort announce of a freshly obtained token. Never fails and
    /// never blocks the refresh flow that triggered it.
    pub fn announce(&self, token: &str) {
        let Some(bus) = &self.bus else { return };
        let delivered = bus.publish(SyncMessage::NewAccessToken { token: token.to_owned() });
        tracing::debug!(channel = %bus.name(), delivered, "announced fresh token");
    }

    /// Best-effort announce that this context logged out explicitly.
    pub fn announce_logout(&self) {
        let Some(bus) = &self.bus else { return };
        let delivered = bus.publish(SyncMessage::LoggedOut);
        tracing::debug!(channel = %bus.name(), delivered, "announced logout");
    }

    /// Spawn the listener that applies sibling messages to the local
    /// store. No-op without a bus. Stops when `shutdown` is cancelled.
    pub fn spawn_listener(&self, store: Arc<CredentialStore>, shutdown: CancellationToken) {
        let Some(bus) = &self.bus else { return };
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(SyncMessage::NewAccessToken { token }) => {
                            tracing::debug!("adopting token from sibling context");
                            store.adopt(token);
                        }
                        Ok(SyncMessage::LoggedOut) => {
                            tracing::info!("sibling context logged out, clearing session");
                            store.clear_for_logout();
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            // Missed announcements are recovered by the
                            // next 401-triggered refresh.
                            tracing::debug!(skipped = n, "context listener lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        });
    }
}
