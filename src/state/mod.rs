// SPDX-License-Identifier: MPL-2.0

mod current_user;
mod prefs;
pub mod settings;

pub use current_user::CurrentUserStore;
pub use prefs::{PreferenceStore, Theme, TokenProvider};
pub use settings::AppSettings;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrefsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("path error: {0}")]
    Path(String),
    #[error("background task failed: {0}")]
    Background(String),
}

/// Write `contents` to `path` off the async workers, replacing it atomically.
pub(crate) async fn write_file(path: PathBuf, contents: String) -> Result<(), PrefsError> {
    tokio::task::spawn_blocking(move || -> Result<(), PrefsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    })
    .await
    .map_err(|e| PrefsError::Background(e.to_string()))?
}

/// Remove `path`; a file that is already gone counts as removed.
pub(crate) async fn remove_file(path: PathBuf) -> Result<(), PrefsError> {
    tokio::task::spawn_blocking(move || match std::fs::remove_file(&path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PrefsError::Io(e)),
    })
    .await
    .map_err(|e| PrefsError::Background(e.to_string()))?
}
