// SPDX-License-Identifier: MPL-2.0

//! Async repositories over the cache.
//!
//! Each repository owns a handle to the shared `CacheDb`, maps between API
//! types and cached records, and runs every storage call on the blocking
//! pool so callers on the async workers never wait on SQLite.

mod drafts;
mod follows;
mod likes;
mod posts;

pub use drafts::DraftRepository;
pub use follows::FollowRepository;
pub use likes::LikeRepository;
pub use posts::PostRepository;
