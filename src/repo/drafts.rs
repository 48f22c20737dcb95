// SPDX-License-Identifier: MPL-2.0

use crate::api::NewPost;
use crate::cache::{CacheDb, CacheError, DraftCache, DraftRecord, LiveQuery, Table};

#[derive(Clone)]
pub struct DraftRepository {
    db: CacheDb,
}

impl DraftRepository {
    pub fn new(db: CacheDb) -> Self {
        Self { db }
    }

    /// Save a new draft and return its local id
    pub async fn save(&self, draft: NewPost) -> Result<i64, CacheError> {
        self.db.call(move |db| DraftCache::new(db).insert(&draft)).await
    }

    pub async fn update(&self, id: i64, draft: NewPost) -> Result<(), CacheError> {
        self.db
            .call(move |db| DraftCache::new(db).update(id, &draft))
            .await
    }

    /// One-shot lookup, used when publishing
    pub async fn find(&self, id: i64) -> Result<Option<DraftRecord>, CacheError> {
        self.db.call(move |db| DraftCache::new(db).get(id)).await
    }

    pub fn read_all(&self) -> LiveQuery<Vec<DraftRecord>> {
        LiveQuery::spawn(&self.db, &[Table::Drafts], |db| DraftCache::new(db).all())
    }

    pub fn get_by_id(&self, id: i64) -> LiveQuery<Option<DraftRecord>> {
        LiveQuery::spawn(&self.db, &[Table::Drafts], move |db| {
            DraftCache::new(db).get(id)
        })
    }

    /// Returns whether the draft existed
    pub async fn delete(&self, id: i64) -> Result<bool, CacheError> {
        self.db.call(move |db| DraftCache::new(db).delete(id)).await
    }

    pub async fn delete_all(&self) -> Result<(), CacheError> {
        self.db.call(|db| DraftCache::new(db).clear()).await
    }
}
