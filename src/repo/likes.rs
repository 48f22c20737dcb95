// SPDX-License-Identifier: MPL-2.0

use crate::api::Like;
use crate::cache::{CacheDb, CacheError, LikeCache, LiveQuery, Table};

#[derive(Clone)]
pub struct LikeRepository {
    db: CacheDb,
}

impl LikeRepository {
    pub fn new(db: CacheDb) -> Self {
        Self { db }
    }

    pub async fn insert(&self, like: Like) -> Result<(), CacheError> {
        self.db.call(move |db| LikeCache::new(db).upsert(&like)).await
    }

    /// Remove `unliked` and store `liked` for one user, atomically
    pub async fn reconcile(
        &self,
        user_id: &str,
        unliked: Vec<String>,
        liked: Vec<Like>,
    ) -> Result<(), CacheError> {
        let user_id = user_id.to_string();
        self.db
            .call(move |db| LikeCache::new(db).reconcile(&user_id, &unliked, &liked))
            .await
    }

    pub async fn delete(&self, user_id: &str, target_id: &str) -> Result<(), CacheError> {
        let (user_id, target_id) = (user_id.to_string(), target_id.to_string());
        self.db
            .call(move |db| LikeCache::new(db).delete(&user_id, &target_id))
            .await
    }

    /// One-shot check, for deciding between like and unlike
    pub async fn contains(&self, user_id: &str, target_id: &str) -> Result<bool, CacheError> {
        let (user_id, target_id) = (user_id.to_string(), target_id.to_string());
        self.db
            .call(move |db| LikeCache::new(db).is_liked(&user_id, &target_id))
            .await
    }

    pub fn is_liked(&self, user_id: &str, target_id: &str) -> LiveQuery<bool> {
        let (user_id, target_id) = (user_id.to_string(), target_id.to_string());
        LiveQuery::spawn(&self.db, &[Table::Likes], move |db| {
            LikeCache::new(db).is_liked(&user_id, &target_id)
        })
    }

    pub fn read_all(&self) -> LiveQuery<Vec<Like>> {
        LiveQuery::spawn(&self.db, &[Table::Likes], |db| LikeCache::new(db).all())
    }

    pub fn liked_ids(&self, user_id: &str) -> LiveQuery<Vec<String>> {
        let user_id = user_id.to_string();
        LiveQuery::spawn(&self.db, &[Table::Likes], move |db| {
            LikeCache::new(db).liked_ids(&user_id)
        })
    }

    pub async fn delete_all(&self) -> Result<(), CacheError> {
        self.db.call(|db| LikeCache::new(db).clear()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::LikeTarget;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn next(live: &mut LiveQuery<bool>) -> bool {
        timeout(Duration::from_secs(5), live.next())
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn is_liked_flips_with_insert_and_delete() {
        let repo = LikeRepository::new(CacheDb::open_in_memory().unwrap());
        let mut liked = repo.is_liked("me", "p1");

        assert!(!next(&mut liked).await);

        repo.insert(Like {
            user_id: "me".into(),
            target_id: "p1".into(),
            target: LikeTarget::Post,
        })
        .await
        .unwrap();
        assert!(next(&mut liked).await);

        repo.delete("me", "p1").await.unwrap();
        assert!(!next(&mut liked).await);
        assert!(!repo.contains("me", "p1").await.unwrap());
    }
}
