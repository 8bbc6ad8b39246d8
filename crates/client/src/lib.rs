// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lodge: session client for the room-rental marketplace backend.
//!
//! Every outgoing request gets the current bearer token attached. A 401
//! response triggers a single de-duplicated token refresh followed by at
//! most one retry of the original request; callers only ever see a final
//! response or a final error. Fresh tokens (and explicit logouts) are
//! propagated best-effort to sibling execution contexts of the same
//! session over a [`ContextBus`].

pub mod config;
pub mod credential;
pub mod error;
pub mod transport;

pub use config::ClientConfig;
pub use credential::broadcast::ContextBus;
pub use credential::store::{CredentialStore, FileMarkerStore, MarkerStore, MemoryMarkerStore};
pub use credential::{SessionEvent, SyncMessage};
pub use error::ApiError;
pub use transport::client::SessionClient;
pub use transport::ApiRequest;
