// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! De-duplicated access token refresh.
//!
//! Any number of requests that hit a 401 while a refresh is already in
//! flight await the same shared future; the backend sees exactly one
//! refresh round-trip per expiry. A failed refresh resolves to `None` —
//! it never errors — and interpreting `None` as "session invalid" is the
//! recovery handler's job, not this module's.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::Deserialize;

use crate::credential::broadcast::SessionBroadcaster;
use crate::credential::store::CredentialStore;

type InflightRefresh = Shared<BoxFuture<'static, Option<String>>>;

/// Successful refresh response (rest of the body is backend-defined).
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Coordinates refresh calls so at most one is in flight at a time.
pub struct RefreshGate {
    http: reqwest::Client,
    refresh_url: String,
    timeout: Duration,
    store: Arc<CredentialStore>,
    broadcaster: Arc<SessionBroadcaster>,
    inflight: Mutex<Option<InflightRefresh>>,
}

impl RefreshGate {
    pub fn new(
        http: reqwest::Client,
        refresh_url: String,
        timeout: Duration,
        store: Arc<CredentialStore>,
        broadcaster: Arc<SessionBroadcaster>,
    ) -> Self {
        Self { http, refresh_url, timeout, store, broadcaster, inflight: Mutex::new(None) }
    }

    /// Obtain a fresh access token, joining an in-flight attempt if one
    /// exists. Resolves to `None` on any failure.
    ///
    /// The exists-check and the slot assignment happen under one lock with
    /// no await point in between, so two callers in the same scheduler
    /// tick can never both start a network call.
    pub async fn refresh(&self) -> Option<String> {
        let fut = {
            let mut slot = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(inflight) = slot.as_ref() {
                tracing::debug!("refresh already in flight, joining");
                inflight.clone()
            } else {
                let fut = Self::run(
                    self.http.clone(),
                    self.refresh_url.clone(),
                    self.timeout,
                    Arc::clone(&self.store),
                    Arc::clone(&self.broadcaster),
                )
                .boxed()
                .shared();
                *slot = Some(fut.clone());
                fut
            }
        };

        let token = fut.await;
        self.clear_settled();
        token
    }

    /// Clear the in-flight slot once the future it holds has settled.
    ///
    /// Every awaiter calls this after resolving. A waiter that grabbed the
    /// settled future just before clearing still resolves from its own
    /// clone; an unsettled future (a newer attempt) is left in place.
    fn clear_settled(&self) {
        let mut slot = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|fut| fut.peek().is_some()) {
            *slot = None;
        }
    }

    /// The single network round-trip behind the shared future.
    ///
    /// The backend reads the long-lived refresh token from the HttpOnly
    /// cookie held in this client's jar; the POST body is deliberately
    /// empty.
    async fn run(
        http: reqwest::Client,
        url: String,
        timeout: Duration,
        store: Arc<CredentialStore>,
        broadcaster: Arc<SessionBroadcaster>,
    ) -> Option<String> {
        let sent = http.post(&url).timeout(timeout).json(&serde_json::json!({})).send().await;

        let resp = match sent {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(err = %e, "refresh request failed");
                return None;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(%status, "refresh rejected by backend");
            return None;
        }

        let parsed: RefreshResponse = match resp.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(err = %e, "refresh response had unexpected shape");
                return None;
            }
        };

        store.set(parsed.access_token.clone());
        broadcaster.announce(&parsed.access_token);
        tracing::debug!("access token refreshed");
        Some(parsed.access_token)
    }
}

#[cfg(test)]
#[path = "refresh_tests.rs"]
mod tests;
