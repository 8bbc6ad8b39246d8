// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The authenticated session client.
//!
//! Request flow: attach the current bearer token (synchronously, never
//! suspending) → send → on 401, run one de-duplicated refresh and retry
//! the original request exactly once with the fresh token. Callers see a
//! final response or a final error, never an intermediate state.

use std::sync::Arc;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::credential::broadcast::{ContextBus, SessionBroadcaster};
use crate::credential::refresh::RefreshGate;
use crate::credential::store::{CredentialStore, MarkerStore, MemoryMarkerStore};
use crate::credential::SessionEvent;
use crate::error::ApiError;
use crate::transport::{ApiRequest, RetryMarker};

/// Whether a status should trigger token recovery.
///
/// Only 401 qualifies. 403 means the authenticated user lacks permission;
/// a fresh token would not change the answer, so it passes through final.
fn recoverable(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED
}

/// Login success payload (the rest of the body is backend-defined).
#[derive(Debug, serde::Deserialize)]
struct AuthResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Authenticated HTTP client for one execution context of a session.
///
/// Owns the credential store, the refresh gate, and the cookie jar that
/// carries the backend's long-lived HttpOnly session cookie. Create one at
/// application start and pass it by reference to wherever requests
/// originate.
pub struct SessionClient {
    base_url: String,
    http: reqwest::Client,
    store: Arc<CredentialStore>,
    gate: RefreshGate,
    broadcaster: Arc<SessionBroadcaster>,
    shutdown: CancellationToken,
}

impl SessionClient {
    /// Build a client for one execution context.
    ///
    /// `bus` connects sibling contexts of the same session; pass `None`
    /// for single-context use. `markers` is the durable store for the
    /// explicit-logout marker (file-backed in production, in-memory in
    /// tests).
    pub fn new(
        config: &ClientConfig,
        markers: Arc<dyn MarkerStore>,
        bus: Option<ContextBus>,
    ) -> Self {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();

        let store = Arc::new(CredentialStore::new(markers));
        let broadcaster = Arc::new(SessionBroadcaster::new(bus));
        let shutdown = CancellationToken::new();
        broadcaster.spawn_listener(Arc::clone(&store), shutdown.clone());

        let gate = RefreshGate::new(
            http.clone(),
            config.refresh_url(),
            config.refresh_timeout(),
            Arc::clone(&store),
            Arc::clone(&broadcaster),
        );

        Self {
            base_url: config.base_url().to_owned(),
            http,
            store,
            gate,
            broadcaster,
            shutdown,
        }
    }

    /// Convenience constructor: in-memory markers, no sibling bus.
    pub fn standalone(config: &ClientConfig) -> Self {
        Self::new(config, Arc::new(MemoryMarkerStore::default()), None)
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Observe session lifecycle events (refresh, clear, logout). UI-layer
    /// reactions like a redirect to login hang off this.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.store.subscribe()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Synchronous bearer decoration. No token → no header: public
    /// endpoints exist and rejecting is the backend's job.
    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.store.get() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn build(&self, req: &ApiRequest, fresh_token: Option<&str>) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(req.method.clone(), self.url(&req.path));
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }
        match fresh_token {
            Some(token) => builder.bearer_auth(token),
            None => self.apply_auth(builder),
        }
    }

    /// Send with 401 recovery. Returns the final response whatever its
    /// status; transport failures are the only error path here.
    async fn dispatch(&self, req: &ApiRequest) -> Result<Response, ApiError> {
        let mut marker = RetryMarker::default();
        let mut fresh_token: Option<String> = None;

        loop {
            let resp =
                self.build(req, fresh_token.as_deref()).send().await.map_err(ApiError::Transport)?;
            let status = resp.status();

            if !recoverable(status) {
                return Ok(resp);
            }
            if !marker.try_arm() {
                // Second 401 in a row, even with a fresh token: hard auth
                // failure, not a transient expiry. The store is left
                // intact; a later request may run its own refresh cycle.
                tracing::warn!(path = %req.path, "still unauthorized after retry");
                return Ok(resp);
            }

            tracing::debug!(path = %req.path, "unauthorized, attempting token refresh");
            match self.gate.refresh().await {
                Some(token) => fresh_token = Some(token),
                None => {
                    tracing::info!(path = %req.path, "token refresh failed, clearing session");
                    self.store.clear();
                    return Ok(resp);
                }
            }
        }
    }

    /// Map a final response: non-2xx becomes `ApiError::Status`.
    async fn expect_success(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ApiError::Status { status, body })
    }

    async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let bytes = resp.bytes().await.map_err(ApiError::Transport)?;
        serde_json::from_slice(&bytes).map_err(ApiError::Decode)
    }

    /// Send a request with recovery and require a success status.
    pub async fn send(&self, req: ApiRequest) -> Result<Response, ApiError> {
        let resp = self.dispatch(&req).await?;
        Self::expect_success(resp).await
    }

    /// Authenticated GET, decoded as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self.send(ApiRequest::get(path)).await?;
        Self::read_json(resp).await
    }

    /// Authenticated POST. An empty response body decodes as `Null`.
    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let resp = self.send(ApiRequest::post(path, body.clone())).await?;
        Self::read_json_or_null(resp).await
    }

    /// Authenticated PUT. An empty response body decodes as `Null`.
    pub async fn put_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ApiError> {
        let resp = self.send(ApiRequest::put(path, body.clone())).await?;
        Self::read_json_or_null(resp).await
    }

    /// Authenticated DELETE; the response body is discarded.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(path)).await?;
        Ok(())
    }

    async fn read_json_or_null(resp: Response) -> Result<serde_json::Value, ApiError> {
        let bytes = resp.bytes().await.map_err(ApiError::Transport)?;
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(ApiError::Decode)
    }

    /// Log in with password credentials. On success the backend sets the
    /// HttpOnly refresh cookie in this client's jar; the short-lived token
    /// goes into the store and is announced to sibling contexts.
    ///
    /// Deliberately bypasses recovery — a 401 here means bad credentials,
    /// not an expired token.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(ApiError::Transport)?;
        let resp = Self::expect_success(resp).await?;
        let auth: AuthResponse = Self::read_json(resp).await?;

        self.store.set(auth.access_token.clone());
        self.broadcaster.announce(&auth.access_token);
        tracing::info!("logged in");
        Ok(())
    }

    /// Create an account. Public endpoint; does not authenticate the
    /// session, since the backend verifies an OTP before first login.
    pub async fn signup(&self, body: &serde_json::Value) -> Result<serde_json::Value, ApiError> {
        let resp = self
            .http
            .post(self.url("/auth/signup"))
            .json(body)
            .send()
            .await
            .map_err(ApiError::Transport)?;
        let resp = Self::expect_success(resp).await?;
        Self::read_json_or_null(resp).await
    }

    /// Log out everywhere. The backend revocation call is best-effort;
    /// locally the token is dropped, the durable marker set, and siblings
    /// told regardless of whether the backend was reachable.
    pub async fn logout(&self) {
        let req = self.apply_auth(self.http.post(self.url("/auth/logout")));
        if let Err(e) = req.send().await {
            tracing::debug!(err = %e, "logout call failed, clearing locally anyway");
        }
        self.store.clear_for_logout();
        self.broadcaster.announce_logout();
        tracing::info!("logged out");
    }

    /// Attempt a silent session resume on startup. Returns whether a token
    /// was obtained.
    ///
    /// Skipped entirely when the durable logout marker is set, so an
    /// explicit logout survives a restart without any network call.
    pub async fn bootstrap(&self) -> bool {
        if self.store.logged_out_marker_set() {
            tracing::debug!("logout marker set, skipping silent refresh");
            return false;
        }
        self.gate.refresh().await.is_some()
    }
}

impl Drop for SessionClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
