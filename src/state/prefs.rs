// SPDX-License-Identifier: MPL-2.0

//! Small key-value preferences: the auth token, the push token and the theme.
//!
//! Values live in one JSON file. Each value is also held in a `watch` channel
//! so readers always see the last written value without touching the disk,
//! and can await changes. A write persists the whole file first and only
//! publishes once the file is on disk.

use crate::state::{PrefsError, write_file};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

/// On-disk shape of the preferences file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Preferences {
    #[serde(default)]
    auth_token: String,
    #[serde(default)]
    fcm_token: String,
    #[serde(default)]
    theme: Theme,
}

struct Inner {
    /// None keeps everything in memory
    path: Option<PathBuf>,
    auth_token: watch::Sender<String>,
    fcm_token: watch::Sender<String>,
    theme: watch::Sender<Theme>,
    /// Serializes persist-then-publish so the file never lags the channels
    write_lock: Mutex<()>,
}

/// Handle to the preferences file. Clones share the same state.
#[derive(Clone)]
pub struct PreferenceStore {
    inner: Arc<Inner>,
}

impl PreferenceStore {
    /// Load preferences from `path`. A missing or unreadable file starts from defaults.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let prefs = match std::fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "preferences file is corrupt, using defaults");
                Preferences::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Preferences::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "preferences file is unreadable, using defaults");
                Preferences::default()
            }
        };
        Self::with_prefs(Some(path), prefs)
    }

    /// Preferences that are never written to disk
    pub fn ephemeral() -> Self {
        Self::with_prefs(None, Preferences::default())
    }

    fn with_prefs(path: Option<PathBuf>, prefs: Preferences) -> Self {
        Self {
            inner: Arc::new(Inner {
                path,
                auth_token: watch::Sender::new(prefs.auth_token),
                fcm_token: watch::Sender::new(prefs.fcm_token),
                theme: watch::Sender::new(prefs.theme),
                write_lock: Mutex::new(()),
            }),
        }
    }

    /// Provider for the session token attached to API requests
    pub fn auth_token(&self) -> TokenProvider {
        TokenProvider {
            store: self.clone(),
            slot: TokenSlot::Auth,
        }
    }

    /// Provider for the push-messaging registration token
    pub fn push_token(&self) -> TokenProvider {
        TokenProvider {
            store: self.clone(),
            slot: TokenSlot::Push,
        }
    }

    pub fn theme(&self) -> Theme {
        *self.inner.theme.borrow()
    }

    pub fn theme_stream(&self) -> watch::Receiver<Theme> {
        self.inner.theme.subscribe()
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<(), PrefsError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut prefs = self.snapshot();
        prefs.theme = theme;
        self.persist(&prefs).await?;
        self.inner.theme.send_replace(theme);
        Ok(())
    }

    fn sender(&self, slot: TokenSlot) -> &watch::Sender<String> {
        match slot {
            TokenSlot::Auth => &self.inner.auth_token,
            TokenSlot::Push => &self.inner.fcm_token,
        }
    }

    async fn set_token(&self, slot: TokenSlot, token: String) -> Result<(), PrefsError> {
        let _guard = self.inner.write_lock.lock().await;
        let mut prefs = self.snapshot();
        match slot {
            TokenSlot::Auth => prefs.auth_token = token.clone(),
            TokenSlot::Push => prefs.fcm_token = token.clone(),
        }
        self.persist(&prefs).await?;
        self.sender(slot).send_replace(token);
        debug!(slot = ?slot, "token updated");
        Ok(())
    }

    fn snapshot(&self) -> Preferences {
        Preferences {
            auth_token: self.inner.auth_token.borrow().clone(),
            fcm_token: self.inner.fcm_token.borrow().clone(),
            theme: *self.inner.theme.borrow(),
        }
    }

    async fn persist(&self, prefs: &Preferences) -> Result<(), PrefsError> {
        let Some(path) = self.inner.path.clone() else {
            return Ok(());
        };
        let json = serde_json::to_string_pretty(prefs)?;
        write_file(path, json).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSlot {
    Auth,
    Push,
}

/// Read/write access to one stored token.
///
/// `current()` reads the last published value and never waits, which is what
/// the HTTP client relies on when attaching credentials. An empty string means
/// no token is set.
#[derive(Clone)]
pub struct TokenProvider {
    store: PreferenceStore,
    slot: TokenSlot,
}

impl TokenProvider {
    pub fn current(&self) -> String {
        self.store.sender(self.slot).borrow().clone()
    }

    /// Stream of token values, starting from the current one
    pub fn stream(&self) -> watch::Receiver<String> {
        self.store.sender(self.slot).subscribe()
    }

    pub async fn set(&self, token: impl Into<String>) -> Result<(), PrefsError> {
        self.store.set_token(self.slot, token.into()).await
    }

    pub async fn clear(&self) -> Result<(), PrefsError> {
        self.set(String::new()).await
    }

    pub fn is_set(&self) -> bool {
        !self.store.sender(self.slot).borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_token_defaults_to_empty_string() {
        let store = PreferenceStore::ephemeral();
        let tokens = store.auth_token();
        assert_eq!(tokens.current(), "");
        assert_eq!(*tokens.stream().borrow(), "");
        assert!(!tokens.is_set());
    }

    #[tokio::test]
    async fn set_token_publishes_to_existing_streams() {
        let store = PreferenceStore::ephemeral();
        let tokens = store.auth_token();
        let mut stream = tokens.stream();

        tokens.set("abc").await.unwrap();

        stream.changed().await.unwrap();
        assert_eq!(*stream.borrow_and_update(), "abc");
        assert_eq!(tokens.current(), "abc");

        tokens.clear().await.unwrap();
        stream.changed().await.unwrap();
        assert_eq!(*stream.borrow(), "");
    }

    #[tokio::test]
    async fn auth_and_push_tokens_are_independent() {
        let store = PreferenceStore::ephemeral();
        store.push_token().set("fcm-1").await.unwrap();
        assert_eq!(store.auth_token().current(), "");
        assert_eq!(store.push_token().current(), "fcm-1");
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let store = PreferenceStore::open(&path);
        store.auth_token().set("tok").await.unwrap();
        store.set_theme(Theme::Dark).await.unwrap();

        let reopened = PreferenceStore::open(&path);
        assert_eq!(reopened.auth_token().current(), "tok");
        assert_eq!(reopened.theme(), Theme::Dark);
        assert_eq!(reopened.push_token().current(), "");
    }

    #[tokio::test]
    async fn theme_stream_sees_changes() {
        let store = PreferenceStore::ephemeral();
        let mut themes = store.theme_stream();
        assert_eq!(*themes.borrow(), Theme::System);

        store.set_theme(Theme::Light).await.unwrap();
        themes.changed().await.unwrap();
        assert_eq!(*themes.borrow_and_update(), Theme::Light);
        assert_eq!(store.theme(), Theme::Light);
    }

    #[test]
    fn unreadable_path_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be cannot be read as text
        let store = PreferenceStore::open(dir.path());
        assert_eq!(store.auth_token().current(), "");
        assert_eq!(store.theme(), Theme::System);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = PreferenceStore::open(&path);
        assert_eq!(store.auth_token().current(), "");
        assert_eq!(store.theme(), Theme::System);
    }
}
