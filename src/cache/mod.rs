// SPDX-License-Identifier: MPL-2.0

mod db;
mod drafts;
mod follows;
mod likes;
mod live;
mod posts;
mod schema;

pub use db::{CacheDb, Table};
pub use drafts::{DraftCache, DraftRecord};
pub use follows::{FollowCache, FollowDirection, FollowRecord};
pub use likes::LikeCache;
pub use live::LiveQuery;
pub use posts::{PostCache, PostRecord};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("not found")]
    NotFound,
    #[error("database path error: {0}")]
    Path(String),
    #[error("background task failed: {0}")]
    Background(String),
}
