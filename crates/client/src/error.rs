// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use reqwest::StatusCode;

/// Final errors surfaced to callers of the session client.
///
/// Recovery (one refresh plus one retry) already happened by the time one
/// of these is produced; a `Status` error is terminal for its request.
#[derive(Debug)]
pub enum ApiError {
    /// Backend answered with a non-success status.
    Status { status: StatusCode, body: String },
    /// The request never produced a response (connect, timeout, TLS).
    Transport(reqwest::Error),
    /// The response body did not match the expected shape.
    Decode(serde_json::Error),
}

impl ApiError {
    /// The HTTP status, when the backend answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            Self::Decode(_) => None,
        }
    }

    /// Whether this is a final authorization failure. The session is
    /// invalid; the caller must re-authenticate interactively.
    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status { status, body } => {
                if body.is_empty() {
                    write!(f, "backend returned {status}")
                } else {
                    write!(f, "backend returned {status}: {body}")
                }
            }
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Decode(e) => write!(f, "unexpected response shape: {e}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Status { .. } => None,
            Self::Transport(e) => Some(e),
            Self::Decode(e) => Some(e),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e)
    }
}
