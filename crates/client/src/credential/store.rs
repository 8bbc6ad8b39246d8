// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Access token store and the durable explicit-logout marker.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;

use crate::credential::{SessionEvent, LOGOUT_MARKER_KEY};

/// Durable key-value storage for session markers.
///
/// Implementations hold tiny non-secret markers only — never the token.
pub trait MarkerStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Marker store held in memory (tests, throwaway sessions).
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MarkerStore for MemoryMarkerStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).remove(key);
    }
}

/// Marker store backed by a JSON file, written atomically (tmp + rename).
///
/// Write failures are logged and swallowed — a session that cannot persist
/// its logout marker still logs out locally.
#[derive(Debug)]
pub struct FileMarkerStore {
    path: PathBuf,
}

impl FileMarkerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Marker file under the resolved lodge state directory.
    pub fn in_state_dir() -> Self {
        Self::new(crate::credential::state_dir().join("markers.json"))
    }

    fn load(&self) -> HashMap<String, String> {
        let Ok(contents) = std::fs::read_to_string(&self.path) else {
            return HashMap::new();
        };
        serde_json::from_str(&contents).unwrap_or_default()
    }

    fn save(&self, entries: &HashMap<String, String>) {
        use std::sync::atomic::{AtomicU32, Ordering};
        static COUNTER: AtomicU32 = AtomicU32::new(0);

        if let Some(dir) = self.path.parent() {
            if !dir.exists() {
                if let Err(e) = std::fs::create_dir_all(dir) {
                    tracing::warn!(err = %e, "failed to create marker dir");
                    return;
                }
            }
        }

        let json = match serde_json::to_string_pretty(entries) {
            Ok(j) => j,
            Err(e) => {
                tracing::warn!(err = %e, "failed to encode markers");
                return;
            }
        };

        // Unique temp filename (PID + counter) so concurrent saves cannot
        // corrupt each other through a shared `.tmp` file.
        let seq = COUNTER.fetch_add(1, Ordering::Relaxed);
        let tmp_name = format!(
            "{}.{}.{}.tmp",
            self.path.file_name().unwrap_or_default().to_string_lossy(),
            std::process::id(),
            seq,
        );
        let tmp_path = self.path.with_file_name(tmp_name);
        if let Err(e) = std::fs::write(&tmp_path, json) {
            tracing::warn!(err = %e, "failed to write marker file");
            return;
        }
        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            tracing::warn!(err = %e, "failed to replace marker file");
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MarkerStore for FileMarkerStore {
    fn get(&self, key: &str) -> Option<String> {
        self.load().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.load();
        entries.insert(key.to_owned(), value.to_owned());
        self.save(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.load();
        if entries.remove(key).is_some() {
            self.save(&entries);
        }
    }
}

/// Process-wide holder of the current short-lived access token.
///
/// Plain state: no operation here can fail. Reads and writes are
/// synchronous so request decoration never suspends.
pub struct CredentialStore {
    token: Mutex<Option<String>>,
    markers: Arc<dyn MarkerStore>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl CredentialStore {
    pub fn new(markers: Arc<dyn MarkerStore>) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self { token: Mutex::new(None), markers, event_tx }
    }

    /// Observe session lifecycle events (refresh, clear, logout).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Current token, if any. Synchronous, no side effects.
    pub fn get(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Client-side optimistic view only; the backend's durable session
    /// lives in a cookie this process cannot inspect.
    pub fn is_authenticated(&self) -> bool {
        self.token.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Store a freshly obtained token and clear the explicit-logout marker.
    pub fn set(&self, token: String) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(token);
        self.markers.remove(LOGOUT_MARKER_KEY);
        let _ = self.event_tx.send(SessionEvent::Refreshed);
    }

    /// Store a token received from a sibling context. Idempotent: adopting
    /// the same token twice is harmless.
    pub fn adopt(&self, token: String) {
        self.set(token);
    }

    /// Drop the token after a failed silent refresh. The logout marker is
    /// left untouched — the user did not ask to log out.
    pub fn clear(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        let _ = self.event_tx.send(SessionEvent::Cleared);
    }

    /// Drop the token and set the durable explicit-logout marker so no
    /// context silently resumes this session after a restart.
    pub fn clear_for_logout(&self) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = None;
        self.markers.set(LOGOUT_MARKER_KEY, "true");
        let _ = self.event_tx.send(SessionEvent::LoggedOut);
    }

    /// Whether the user explicitly logged out (silent resume must not run).
    pub fn logged_out_marker_set(&self) -> bool {
        self.markers.get(LOGOUT_MARKER_KEY).as_deref() == Some("true")
    }
}
