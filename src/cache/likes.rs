// SPDX-License-Identifier: MPL-2.0

use crate::api::{Like, LikeTarget};
use crate::cache::{CacheDb, CacheError, Table};
use rusqlite::{Connection, params};

/// Cache operations for likes
pub struct LikeCache<'a> {
    db: &'a CacheDb,
}

impl<'a> LikeCache<'a> {
    pub fn new(db: &'a CacheDb) -> Self {
        Self { db }
    }

    pub fn upsert(&self, like: &Like) -> Result<(), CacheError> {
        {
            let conn = self.db.conn();
            Self::write(&conn, like, CacheDb::now())?;
        }
        self.db.notify(Table::Likes);
        Ok(())
    }

    pub fn upsert_all(&self, likes: &[Like]) -> Result<(), CacheError> {
        if likes.is_empty() {
            return Ok(());
        }
        {
            let mut conn = self.db.conn();
            let tx = conn.transaction()?;
            let now = CacheDb::now();
            for like in likes {
                Self::write(&tx, like, now)?;
            }
            tx.commit()?;
        }
        self.db.notify(Table::Likes);
        Ok(())
    }

    /// Bring one user's likes in line with a server listing in one transaction.
    ///
    /// Rows for `unliked` targets are removed and `liked` is upserted.
    pub fn reconcile(
        &self,
        user_id: &str,
        unliked: &[String],
        liked: &[Like],
    ) -> Result<(), CacheError> {
        if unliked.is_empty() && liked.is_empty() {
            return Ok(());
        }
        {
            let mut conn = self.db.conn();
            let tx = conn.transaction()?;
            for target_id in unliked {
                tx.execute(
                    "DELETE FROM likes WHERE user_id = ? AND target_id = ?",
                    params![user_id, target_id],
                )?;
            }
            let now = CacheDb::now();
            for like in liked {
                Self::write(&tx, like, now)?;
            }
            tx.commit()?;
        }
        self.db.notify(Table::Likes);
        Ok(())
    }

    /// Remove a user's like on a target; absent likes are ignored
    pub fn delete(&self, user_id: &str, target_id: &str) -> Result<(), CacheError> {
        let removed = self.db.conn().execute(
            "DELETE FROM likes WHERE user_id = ? AND target_id = ?",
            params![user_id, target_id],
        )?;
        if removed > 0 {
            self.db.notify(Table::Likes);
        }
        Ok(())
    }

    pub fn is_liked(&self, user_id: &str, target_id: &str) -> Result<bool, CacheError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare("SELECT 1 FROM likes WHERE user_id = ? AND target_id = ?")?;
        Ok(stmt.exists(params![user_id, target_id])?)
    }

    pub fn all(&self) -> Result<Vec<Like>, CacheError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT user_id, target_id, target_kind
            FROM likes
            ORDER BY liked_at DESC, target_id ASC
            "#,
        )?;
        let mut rows = stmt.query([])?;
        let mut likes = Vec::new();
        while let Some(row) = rows.next()? {
            let kind: String = row.get(2)?;
            // Rows with a kind this build doesn't know are skipped
            let Some(target) = LikeTarget::parse(&kind) else {
                continue;
            };
            likes.push(Like {
                user_id: row.get(0)?,
                target_id: row.get(1)?,
                target,
            });
        }
        Ok(likes)
    }

    /// Ids of everything the user has liked
    pub fn liked_ids(&self, user_id: &str) -> Result<Vec<String>, CacheError> {
        let conn = self.db.conn();
        let mut stmt =
            conn.prepare("SELECT target_id FROM likes WHERE user_id = ? ORDER BY target_id ASC")?;
        let ids = stmt
            .query_map([user_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.db.conn().execute("DELETE FROM likes", [])?;
        self.db.notify(Table::Likes);
        Ok(())
    }

    fn write(conn: &Connection, like: &Like, now: i64) -> Result<(), CacheError> {
        conn.execute(
            r#"
            INSERT INTO likes (user_id, target_id, target_kind, liked_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id, target_id) DO UPDATE SET
                target_kind = excluded.target_kind
            "#,
            params![like.user_id, like.target_id, like.target.as_str(), now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn like(user: &str, target: &str) -> Like {
        Like {
            user_id: user.to_string(),
            target_id: target.to_string(),
            target: LikeTarget::Post,
        }
    }

    #[test]
    fn presence_means_liked() {
        let db = CacheDb::open_in_memory().unwrap();
        let cache = LikeCache::new(&db);
        assert!(!cache.is_liked("me", "p1").unwrap());

        cache.upsert(&like("me", "p1")).unwrap();
        assert!(cache.is_liked("me", "p1").unwrap());
        assert!(!cache.is_liked("someone-else", "p1").unwrap());

        cache.delete("me", "p1").unwrap();
        assert!(!cache.is_liked("me", "p1").unwrap());
    }

    #[test]
    fn liking_twice_keeps_one_row() {
        let db = CacheDb::open_in_memory().unwrap();
        let cache = LikeCache::new(&db);
        cache.upsert_all(&[like("me", "p1"), like("me", "p1")]).unwrap();
        assert_eq!(cache.all().unwrap().len(), 1);
    }

    #[test]
    fn reconcile_drops_unliked_and_adds_liked() {
        let db = CacheDb::open_in_memory().unwrap();
        let cache = LikeCache::new(&db);
        cache.upsert_all(&[like("me", "p1"), like("me", "c1"), like("other", "c1")]).unwrap();
        let mut changes = db.subscribe();

        cache
            .reconcile("me", &["p1".to_string(), "c1".to_string()], &[like("me", "p2")])
            .unwrap();

        assert_eq!(cache.liked_ids("me").unwrap(), vec!["p2"]);
        assert_eq!(cache.liked_ids("other").unwrap(), vec!["c1"]);
        assert_eq!(changes.try_recv().unwrap(), Table::Likes);
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn comment_likes_keep_their_kind() {
        let db = CacheDb::open_in_memory().unwrap();
        let cache = LikeCache::new(&db);
        let comment_like = Like {
            target: LikeTarget::Comment,
            ..like("me", "c1")
        };
        cache.upsert(&comment_like).unwrap();
        assert_eq!(cache.all().unwrap(), vec![comment_like]);
        assert_eq!(cache.liked_ids("me").unwrap(), vec!["c1"]);
    }
}
