// SPDX-License-Identifier: MPL-2.0

use std::time::Duration;

pub const APP_ID: &str = "io.github.inkwell.Inkwell";
pub const APP_NAME: &str = "Inkwell";

#[cfg(feature = "devel")]
pub const IS_DEVEL: bool = true;
#[cfg(not(feature = "devel"))]
pub const IS_DEVEL: bool = false;

pub const DEFAULT_API_URL: &str = "https://api.inkwell.blog/";

/// Unique work name for the periodic feed refresh
pub const FEED_SYNC_WORK: &str = "feed-sync";

/// How often the feed sync reruns while the process is alive
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Directory name under the platform data dir
pub const DATA_DIR_NAME: &str = "inkwell";
