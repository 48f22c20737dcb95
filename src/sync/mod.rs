// SPDX-License-Identifier: MPL-2.0

mod feed;
mod network;
mod work;

pub use feed::FeedSyncWorker;
pub use network::NetworkMonitor;
pub use work::{
    Backoff, Constraints, Enqueued, ExistingWorkPolicy, SyncScheduler, WorkHandle, WorkRequest,
    WorkResult, WorkState, Worker,
};

use crate::api::ClientError;
use crate::cache::CacheError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}
