// SPDX-License-Identifier: MPL-2.0

use crate::api::User;
use crate::cache::{CacheDb, CacheError, FollowCache, FollowDirection, FollowRecord, LiveQuery, Table};

/// Local replica of one side of the follow graph.
///
/// Followers and following are separate instances over separate tables and
/// are never reconciled against each other.
#[derive(Clone)]
pub struct FollowRepository {
    db: CacheDb,
    direction: FollowDirection,
}

impl FollowRepository {
    pub fn followers(db: CacheDb) -> Self {
        Self {
            db,
            direction: FollowDirection::Followers,
        }
    }

    pub fn following(db: CacheDb) -> Self {
        Self {
            db,
            direction: FollowDirection::Following,
        }
    }

    fn tables(&self) -> &'static [Table] {
        match self.direction {
            FollowDirection::Followers => &[Table::Followers],
            FollowDirection::Following => &[Table::Following],
        }
    }

    pub async fn insert_one(&self, user: &User) -> Result<(), CacheError> {
        let record = FollowRecord::from(user);
        let direction = self.direction;
        self.db
            .call(move |db| FollowCache::new(db, direction).upsert(&record))
            .await
    }

    pub async fn insert_many(&self, users: &[User]) -> Result<(), CacheError> {
        let records: Vec<FollowRecord> = users.iter().map(FollowRecord::from).collect();
        let direction = self.direction;
        self.db
            .call(move |db| FollowCache::new(db, direction).upsert_all(&records))
            .await
    }

    /// Overwrite the replica with a full server listing
    pub async fn replace_all(&self, users: &[User]) -> Result<(), CacheError> {
        let records: Vec<FollowRecord> = users.iter().map(FollowRecord::from).collect();
        let direction = self.direction;
        self.db
            .call(move |db| FollowCache::new(db, direction).replace_all(&records))
            .await
    }

    pub fn read_all(&self) -> LiveQuery<Vec<User>> {
        let direction = self.direction;
        LiveQuery::spawn(&self.db, self.tables(), move |db| {
            let records = FollowCache::new(db, direction).all()?;
            Ok(records.into_iter().map(User::from).collect())
        })
    }

    pub fn read_all_ids(&self) -> LiveQuery<Vec<String>> {
        let direction = self.direction;
        LiveQuery::spawn(&self.db, self.tables(), move |db| {
            FollowCache::new(db, direction).ids()
        })
    }

    /// Remove one user. Unknown ids are not an error.
    pub async fn delete_one(&self, user_id: &str) -> Result<(), CacheError> {
        let user_id = user_id.to_string();
        let direction = self.direction;
        self.db
            .call(move |db| FollowCache::new(db, direction).delete(&user_id))
            .await
    }

    pub async fn delete_all(&self) -> Result<(), CacheError> {
        let direction = self.direction;
        self.db
            .call(move |db| FollowCache::new(db, direction).clear())
            .await
    }
}
