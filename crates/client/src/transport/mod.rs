// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport: replayable request descriptions and the authenticated
//! session client.

pub mod client;

use reqwest::Method;

/// A replayable description of one outbound API call.
///
/// Requests are kept as data (method, path, optional JSON body) rather
/// than as built `reqwest::Request`s so the recovery path can re-dispatch
/// an identical call after a token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::GET, path: path.into(), body: None }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self { method: Method::POST, path: path.into(), body: Some(body) }
    }

    pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self { method: Method::PUT, path: path.into(), body: Some(body) }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self { method: Method::DELETE, path: path.into(), body: None }
    }
}

/// One-shot retry marker carried alongside a request through recovery.
///
/// Explicit state rather than something re-derived from request headers:
/// set exactly once, checked before any recovery attempt, so a request is
/// auto-retried at most once no matter how the retry turns out.
#[derive(Debug, Default)]
pub(crate) struct RetryMarker {
    retried: bool,
}

impl RetryMarker {
    /// Arms the marker. Returns `true` the first time only; afterwards the
    /// request is out of recovery attempts.
    pub(crate) fn try_arm(&mut self) -> bool {
        if self.retried {
            false
        } else {
            self.retried = true;
            true
        }
    }
}
