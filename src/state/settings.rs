// SPDX-License-Identifier: MPL-2.0

use crate::config::{APP_ID, DATA_DIR_NAME, DEFAULT_API_URL, DEFAULT_SYNC_INTERVAL};
use crate::state::PrefsError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL.as_secs()
}

/// Persistent process settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Base URL of the blogging API
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Period of the background feed refresh
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    /// Where the cache and preference files live; platform data dir when unset
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            sync_interval_secs: default_sync_interval_secs(),
            data_dir: None,
        }
    }
}

impl AppSettings {
    /// Get the settings file path (~/.config/io.github.inkwell.Inkwell/settings.json)
    pub fn settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push(APP_ID);
            p.push("settings.json");
            p
        })
    }

    /// Load settings from the default location, or defaults if not found
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), PrefsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Apply `INKWELL_API_URL` / `INKWELL_DATA_DIR` style overrides
    pub fn with_overrides(mut self, api_url: Option<String>, data_dir: Option<PathBuf>) -> Self {
        if let Some(url) = api_url.filter(|u| !u.is_empty()) {
            self.api_url = url;
        }
        if let Some(dir) = data_dir {
            self.data_dir = Some(dir);
        }
        self
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(60))
    }

    /// Resolved data directory (~/.local/share/inkwell unless overridden)
    pub fn data_dir(&self) -> Result<PathBuf, PrefsError> {
        if let Some(dir) = &self.data_dir {
            return Ok(dir.clone());
        }
        dirs::data_dir()
            .map(|d| d.join(DATA_DIR_NAME))
            .ok_or_else(|| PrefsError::Path("could not find data directory".into()))
    }
}
