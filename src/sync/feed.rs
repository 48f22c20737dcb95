// SPDX-License-Identifier: MPL-2.0

use crate::api::{BlogClient, ClientError};
use crate::repo::PostRepository;
use crate::sync::{SyncError, WorkResult, Worker};
use async_trait::async_trait;
use tracing::{info, warn};

/// Pulls the whole feed and overwrites the cached posts with it.
///
/// Runs are independent: every successful run leaves the cache holding
/// exactly what the server returned.
pub struct FeedSyncWorker {
    client: BlogClient,
    posts: PostRepository,
}

impl FeedSyncWorker {
    pub fn new(client: BlogClient, posts: PostRepository) -> Self {
        Self { client, posts }
    }

    /// One refresh, returning the number of posts now cached
    pub async fn sync(&self) -> Result<usize, SyncError> {
        let posts = self.client.fetch_posts().await?;
        self.posts.replace_all(&posts).await?;
        Ok(posts.len())
    }
}

#[async_trait]
impl Worker for FeedSyncWorker {
    async fn run(&self) -> WorkResult {
        match self.sync().await {
            Ok(count) => {
                info!(count, "feed sync finished");
                WorkResult::Success
            }
            // Retrying won't help until someone signs in again
            Err(SyncError::Client(ClientError::NotAuthenticated)) => {
                warn!("feed sync skipped: not signed in");
                WorkResult::Failure
            }
            Err(e) => {
                warn!(error = %e, "feed sync failed");
                WorkResult::Retry
            }
        }
    }
}
