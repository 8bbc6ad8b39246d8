// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness: an in-process mock of the marketplace backend.
//!
//! Serves the auth endpoints and one protected resource. Specs flip
//! failure switches and read call counters directly through the shared
//! [`BackendState`] handle instead of driving a separate control API.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once, PoisonError};
use std::time::Duration;

use axum::extract::State;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::AppendHeaders;
use axum::routing::{get, post};
use axum::{Json, Router};

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times — only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Poll `cond` every 10ms until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

const REFRESH_COOKIE: &str = "refresh_session=ok";

/// Controllable state of the mock backend.
#[derive(Default)]
pub struct BackendState {
    pub refresh_calls: AtomicUsize,
    pub login_calls: AtomicUsize,
    pub rooms_calls: AtomicUsize,
    /// When set, `/auth/refresh` answers 500.
    pub fail_refresh: AtomicBool,
    /// When set, the protected route answers 401 even for freshly issued
    /// tokens (simulates server-side revocation mid-flight).
    pub reject_all_bearers: AtomicBool,
    /// When set, `/auth/refresh` requires the HttpOnly session cookie.
    pub require_cookie: AtomicBool,
    issued: Mutex<HashSet<String>>,
    seq: AtomicUsize,
}

impl BackendState {
    fn issue(&self) -> String {
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let token = format!("tok-{n}");
        self.issued.lock().unwrap_or_else(PoisonError::into_inner).insert(token.clone());
        token
    }

    fn is_valid(&self, token: &str) -> bool {
        self.issued.lock().unwrap_or_else(PoisonError::into_inner).contains(token)
    }

    /// Revoke every token issued so far; the next authenticated request
    /// will 401 and force a refresh.
    pub fn invalidate_all(&self) {
        self.issued.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn has_refresh_cookie(headers: &HeaderMap) -> bool {
    headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains(REFRESH_COOKIE))
}

async fn login(
    State(s): State<Arc<BackendState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl axum::response::IntoResponse, StatusCode> {
    s.login_calls.fetch_add(1, Ordering::SeqCst);
    if body["password"] == "wrong" {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let token = s.issue();
    Ok((
        AppendHeaders([(SET_COOKIE, format!("{REFRESH_COOKIE}; HttpOnly; Path=/"))]),
        Json(serde_json::json!({ "accessToken": token, "user": { "email": body["email"] } })),
    ))
}

async fn refresh(
    State(s): State<Arc<BackendState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, StatusCode> {
    s.refresh_calls.fetch_add(1, Ordering::SeqCst);
    // Small latency so concurrently failing requests are all waiting on
    // this round-trip before it settles, as a real network would behave.
    tokio::time::sleep(Duration::from_millis(25)).await;
    if s.fail_refresh.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    if s.require_cookie.load(Ordering::SeqCst) && !has_refresh_cookie(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(serde_json::json!({ "accessToken": s.issue() })))
}

async fn logout() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn rooms(
    State(s): State<Arc<BackendState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, StatusCode> {
    s.rooms_calls.fetch_add(1, Ordering::SeqCst);
    if s.reject_all_bearers.load(Ordering::SeqCst) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let authorized = bearer(&headers).is_some_and(|t| s.is_valid(t));
    if !authorized {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(Json(serde_json::json!([
        { "id": 1, "title": "sunny studio", "status": "available" },
        { "id": 2, "title": "shared loft", "status": "rented" },
    ])))
}

/// Running mock backend bound to an ephemeral port.
pub struct MockBackend {
    pub state: Arc<BackendState>,
    pub base_url: String,
}

impl MockBackend {
    pub async fn start() -> anyhow::Result<Self> {
        ensure_crypto();
        let state = Arc::new(BackendState::default());
        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/refresh", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/api/room", get(rooms))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self { state, base_url: format!("http://{addr}") })
    }

    pub fn config(&self) -> lodge::ClientConfig {
        lodge::ClientConfig {
            api_url: self.base_url.clone(),
            request_timeout_ms: 5_000,
            refresh_timeout_ms: 2_000,
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn rooms_calls(&self) -> usize {
        self.state.rooms_calls.load(Ordering::SeqCst)
    }
}
