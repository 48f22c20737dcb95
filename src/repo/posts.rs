// SPDX-License-Identifier: MPL-2.0

use crate::api::Post;
use crate::cache::{CacheDb, CacheError, LiveQuery, PostCache, PostRecord, Table};

/// Offline copy of the feed.
///
/// Only scalar post fields are kept; posts read back from here always have
/// empty comments, views and likes.
#[derive(Clone)]
pub struct PostRepository {
    db: CacheDb,
}

impl PostRepository {
    pub fn new(db: CacheDb) -> Self {
        Self { db }
    }

    /// Upsert each post by id, all in one transaction
    pub async fn insert(&self, posts: &[Post]) -> Result<(), CacheError> {
        let records: Vec<PostRecord> = posts.iter().map(PostRecord::from).collect();
        self.db
            .call(move |db| PostCache::new(db).upsert_all(&records))
            .await
    }

    /// Make the cache hold exactly `posts`
    pub async fn replace_all(&self, posts: &[Post]) -> Result<(), CacheError> {
        let records: Vec<PostRecord> = posts.iter().map(PostRecord::from).collect();
        self.db
            .call(move |db| PostCache::new(db).replace_all(&records))
            .await
    }

    /// Every cached post, re-emitted whenever the posts table changes
    pub fn read(&self) -> LiveQuery<Vec<Post>> {
        LiveQuery::spawn(&self.db, &[Table::Posts], |db| {
            let records = PostCache::new(db).all()?;
            Ok(records.into_iter().map(Post::from).collect())
        })
    }

    /// One cached post, or `None` while it isn't cached
    pub fn get_by_id(&self, id: &str) -> LiveQuery<Option<Post>> {
        let id = id.to_string();
        LiveQuery::spawn(&self.db, &[Table::Posts], move |db| {
            Ok(PostCache::new(db).find(&id)?.map(Post::from))
        })
    }

    pub async fn delete(&self, id: &str) -> Result<(), CacheError> {
        let id = id.to_string();
        self.db.call(move |db| PostCache::new(db).delete(&id)).await
    }

    pub async fn clear(&self) -> Result<(), CacheError> {
        self.db.call(|db| PostCache::new(db).clear()).await
    }
}
