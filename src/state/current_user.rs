// SPDX-License-Identifier: MPL-2.0

use crate::api::User;
use crate::state::{PrefsError, remove_file, write_file};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tracing::warn;

struct Inner {
    path: Option<PathBuf>,
    user: watch::Sender<Option<User>>,
    write_lock: Mutex<()>,
}

/// The signed-in user's profile, kept as a single JSON record.
///
/// Independent of the auth token: either may be present without the other
/// for a moment during login or logout.
#[derive(Clone)]
pub struct CurrentUserStore {
    inner: Arc<Inner>,
}

impl CurrentUserStore {
    /// Load the record at `path`. Missing or undecodable data reads as no user.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let user = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<User>(&bytes) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding unreadable current user record");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read current user record");
                None
            }
        };
        Self::with_user(Some(path), user)
    }

    pub fn ephemeral() -> Self {
        Self::with_user(None, None)
    }

    fn with_user(path: Option<PathBuf>, user: Option<User>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path,
                user: watch::Sender::new(user),
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub fn get(&self) -> Option<User> {
        self.inner.user.borrow().clone()
    }

    pub fn stream(&self) -> watch::Receiver<Option<User>> {
        self.inner.user.subscribe()
    }

    pub async fn set(&self, user: User) -> Result<(), PrefsError> {
        let _guard = self.inner.write_lock.lock().await;
        if let Some(path) = self.inner.path.clone() {
            let json = serde_json::to_string(&user)?;
            write_file(path, json).await?;
        }
        self.inner.user.send_replace(Some(user));
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), PrefsError> {
        let _guard = self.inner.write_lock.lock().await;
        if let Some(path) = self.inner.path.clone() {
            remove_file(path).await?;
        }
        self.inner.user.send_replace(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: "Ada".to_string(),
            username: "ada".to_string(),
            email: Some("ada@example.com".to_string()),
            image: None,
            bio: None,
        }
    }

    #[tokio::test]
    async fn set_get_clear_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current_user.json");

        let store = CurrentUserStore::open(&path);
        assert_eq!(store.get(), None);

        store.set(user("u1")).await.unwrap();
        assert_eq!(CurrentUserStore::open(&path).get(), Some(user("u1")));

        store.clear().await.unwrap();
        assert_eq!(store.get(), None);
        assert!(!path.exists());
        assert_eq!(CurrentUserStore::open(&path).get(), None);
    }

    #[test]
    fn unreadable_record_reads_as_no_user() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(CurrentUserStore::open(dir.path()).get(), None);
    }

    #[test]
    fn corrupt_record_reads_as_no_user() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current_user.json");
        std::fs::write(&path, b"\x00\x01garbage").unwrap();

        assert_eq!(CurrentUserStore::open(&path).get(), None);
    }

    #[tokio::test]
    async fn clearing_twice_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let store = CurrentUserStore::open(dir.path().join("current_user.json"));
        store.clear().await.unwrap();
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn stream_sees_updates() {
        let store = CurrentUserStore::ephemeral();
        let mut stream = store.stream();
        store.set(user("u2")).await.unwrap();
        stream.changed().await.unwrap();
        assert_eq!(stream.borrow().as_ref().map(|u| u.id.as_str()), Some("u2"));
    }
}
