// SPDX-License-Identifier: MPL-2.0

//! Local cache and background sync for the Inkwell blogging client.
//!
//! Screens read posts, follows, likes and drafts from a SQLite-backed cache
//! that emits fresh snapshots on every write. The REST client fills that
//! cache, and a unique-work scheduler keeps the feed current in the
//! background.

pub mod api;
pub mod app;
pub mod cache;
pub mod config;
pub mod repo;
pub mod runtime;
pub mod state;
pub mod sync;

pub use app::{App, AppError};
