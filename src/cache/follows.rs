// SPDX-License-Identifier: MPL-2.0

use crate::api::User;
use crate::cache::{CacheDb, CacheError, Table};
use rusqlite::{Connection, params};

/// Which of the two follow replicas to operate on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowDirection {
    /// Accounts following the signed-in user
    Followers,
    /// Accounts the signed-in user follows
    Following,
}

impl FollowDirection {
    pub fn table(self) -> Table {
        match self {
            FollowDirection::Followers => Table::Followers,
            FollowDirection::Following => Table::Following,
        }
    }

    fn table_name(self) -> &'static str {
        match self {
            FollowDirection::Followers => "followers",
            FollowDirection::Following => "following",
        }
    }
}

/// Cached profile scalars of a follower or followee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowRecord {
    pub id: String,
    pub name: String,
    pub username: String,
    pub image: Option<String>,
    pub bio: Option<String>,
}

impl From<&User> for FollowRecord {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            username: user.username.clone(),
            image: user.image.clone(),
            bio: user.bio.clone(),
        }
    }
}

impl From<FollowRecord> for User {
    fn from(record: FollowRecord) -> Self {
        User {
            id: record.id,
            name: record.name,
            username: record.username,
            email: None,
            image: record.image,
            bio: record.bio,
        }
    }
}

/// Cache operations for one follow direction
pub struct FollowCache<'a> {
    db: &'a CacheDb,
    direction: FollowDirection,
}

impl<'a> FollowCache<'a> {
    pub fn new(db: &'a CacheDb, direction: FollowDirection) -> Self {
        Self { db, direction }
    }

    pub fn upsert(&self, record: &FollowRecord) -> Result<(), CacheError> {
        {
            let conn = self.db.conn();
            self.write(&conn, record, CacheDb::now())?;
        }
        self.db.notify(self.direction.table());
        Ok(())
    }

    /// Upsert many users in one transaction
    pub fn upsert_all(&self, records: &[FollowRecord]) -> Result<(), CacheError> {
        if records.is_empty() {
            return Ok(());
        }
        {
            let mut conn = self.db.conn();
            let tx = conn.transaction()?;
            let now = CacheDb::now();
            for record in records {
                self.write(&tx, record, now)?;
            }
            tx.commit()?;
        }
        self.db.notify(self.direction.table());
        Ok(())
    }

    /// Overwrite the replica with a fresh server listing
    pub fn replace_all(&self, records: &[FollowRecord]) -> Result<(), CacheError> {
        {
            let mut conn = self.db.conn();
            let tx = conn.transaction()?;
            tx.execute(&format!("DELETE FROM {}", self.direction.table_name()), [])?;
            let now = CacheDb::now();
            for record in records {
                self.write(&tx, record, now)?;
            }
            tx.commit()?;
        }
        self.db.notify(self.direction.table());
        Ok(())
    }

    pub fn all(&self) -> Result<Vec<FollowRecord>, CacheError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name, username, image, bio FROM {} ORDER BY username ASC",
            self.direction.table_name()
        ))?;
        let users = stmt
            .query_map([], |row| {
                Ok(FollowRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    username: row.get(2)?,
                    image: row.get(3)?,
                    bio: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Ids only, for membership checks
    pub fn ids(&self) -> Result<Vec<String>, CacheError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id FROM {} ORDER BY id ASC",
            self.direction.table_name()
        ))?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Remove one user; absent ids are ignored
    pub fn delete(&self, user_id: &str) -> Result<(), CacheError> {
        let removed = self.db.conn().execute(
            &format!("DELETE FROM {} WHERE id = ?", self.direction.table_name()),
            [user_id],
        )?;
        if removed > 0 {
            self.db.notify(self.direction.table());
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.db.conn().execute(
            &format!("DELETE FROM {}", self.direction.table_name()),
            [],
        )?;
        self.db.notify(self.direction.table());
        Ok(())
    }

    fn write(&self, conn: &Connection, record: &FollowRecord, now: i64) -> Result<(), CacheError> {
        conn.execute(
            &format!(
                r#"
                INSERT INTO {} (id, name, username, image, bio, fetched_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    username = excluded.username,
                    image = excluded.image,
                    bio = excluded.bio,
                    fetched_at = excluded.fetched_at
                "#,
                self.direction.table_name()
            ),
            params![
                record.id,
                record.name,
                record.username,
                record.image,
                record.bio,
                now
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> FollowRecord {
        FollowRecord {
            id: id.to_string(),
            name: format!("User {id}"),
            username: format!("user{id}"),
            image: None,
            bio: None,
        }
    }

    #[test]
    fn directions_are_independent() {
        let db = CacheDb::open_in_memory().unwrap();
        let followers = FollowCache::new(&db, FollowDirection::Followers);
        let following = FollowCache::new(&db, FollowDirection::Following);

        followers.upsert(&record("1")).unwrap();
        following.upsert_all(&[record("2"), record("3")]).unwrap();

        assert_eq!(followers.ids().unwrap(), vec!["1"]);
        assert_eq!(following.ids().unwrap(), vec!["2", "3"]);

        following.clear().unwrap();
        assert_eq!(followers.ids().unwrap(), vec!["1"]);
        assert!(following.all().unwrap().is_empty());
    }

    #[test]
    fn deleting_absent_id_is_a_noop() {
        let db = CacheDb::open_in_memory().unwrap();
        let followers = FollowCache::new(&db, FollowDirection::Followers);
        followers.upsert(&record("1")).unwrap();

        followers.delete("missing").unwrap();

        assert_eq!(followers.ids().unwrap(), vec!["1"]);
    }

    #[test]
    fn upsert_refreshes_profile_scalars() {
        let db = CacheDb::open_in_memory().unwrap();
        let following = FollowCache::new(&db, FollowDirection::Following);
        following.upsert(&record("1")).unwrap();

        let mut renamed = record("1");
        renamed.name = "Renamed".into();
        following.upsert(&renamed).unwrap();

        let all = following.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Renamed");
    }

    #[test]
    fn replace_all_overwrites_replica() {
        let db = CacheDb::open_in_memory().unwrap();
        let followers = FollowCache::new(&db, FollowDirection::Followers);
        followers.upsert_all(&[record("1"), record("2")]).unwrap();
        followers.replace_all(&[record("2"), record("4")]).unwrap();
        assert_eq!(followers.ids().unwrap(), vec!["2", "4"]);
    }

    #[test]
    fn failed_batch_leaves_replica_untouched() {
        let db = CacheDb::open_in_memory().unwrap();
        let following = FollowCache::new(&db, FollowDirection::Following);
        following.upsert(&record("seed")).unwrap();
        db.conn()
            .execute_batch(
                "CREATE TRIGGER fail BEFORE INSERT ON following WHEN NEW.id = 'bad'
                 BEGIN SELECT RAISE(ABORT, 'boom'); END;",
            )
            .unwrap();
        let mut changes = db.subscribe();

        let batch = [record("good"), record("bad")];
        assert!(matches!(
            following.upsert_all(&batch),
            Err(CacheError::Database(_))
        ));
        assert!(matches!(
            following.replace_all(&batch),
            Err(CacheError::Database(_))
        ));

        let all = following.all().unwrap();
        assert_eq!(all, vec![record("seed")]);
        assert!(changes.try_recv().is_err());
    }
}
