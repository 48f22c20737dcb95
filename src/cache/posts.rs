// SPDX-License-Identifier: MPL-2.0

use crate::api::Post;
use crate::cache::{CacheDb, CacheError, Table};
use rusqlite::{Connection, params};

/// Cached scalar fields of a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: String,
    pub title: String,
    pub body: String,
    pub author_id: String,
    pub image: Option<String>,
    pub posted_at: String,
    pub posted_on: String,
}

impl From<&Post> for PostRecord {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            body: post.body.clone(),
            author_id: post.author.clone(),
            image: post.image.clone(),
            posted_at: post.posted_at.clone(),
            posted_on: post.posted_on.clone(),
        }
    }
}

impl From<PostRecord> for Post {
    /// Cached posts come back without comments, views or likes.
    fn from(record: PostRecord) -> Self {
        Post {
            id: record.id,
            title: record.title,
            body: record.body,
            author: record.author_id,
            image: record.image,
            posted_at: record.posted_at,
            posted_on: record.posted_on,
            comments: Vec::new(),
            views: Vec::new(),
            likes: Vec::new(),
        }
    }
}

const UPSERT_POST: &str = r#"
    INSERT INTO posts (id, title, body, author_id, image, posted_at, posted_on, fetched_at)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
    ON CONFLICT(id) DO UPDATE SET
        title = excluded.title,
        body = excluded.body,
        author_id = excluded.author_id,
        image = excluded.image,
        posted_at = excluded.posted_at,
        posted_on = excluded.posted_on,
        fetched_at = excluded.fetched_at
"#;

/// Cache operations for posts
pub struct PostCache<'a> {
    db: &'a CacheDb,
}

impl<'a> PostCache<'a> {
    pub fn new(db: &'a CacheDb) -> Self {
        Self { db }
    }

    /// Store a single post (upserts)
    pub fn upsert(&self, record: &PostRecord) -> Result<(), CacheError> {
        {
            let conn = self.db.conn();
            Self::write(&conn, record, CacheDb::now())?;
        }
        self.db.notify(Table::Posts);
        Ok(())
    }

    /// Upsert many posts in one transaction; either all rows land or none do
    pub fn upsert_all(&self, records: &[PostRecord]) -> Result<(), CacheError> {
        if records.is_empty() {
            return Ok(());
        }
        {
            let mut conn = self.db.conn();
            let tx = conn.transaction()?;
            let now = CacheDb::now();
            for record in records {
                Self::write(&tx, record, now)?;
            }
            tx.commit()?;
        }
        self.db.notify(Table::Posts);
        Ok(())
    }

    /// Swap the whole table for `records` in one transaction
    pub fn replace_all(&self, records: &[PostRecord]) -> Result<(), CacheError> {
        {
            let mut conn = self.db.conn();
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM posts", [])?;
            let now = CacheDb::now();
            for record in records {
                Self::write(&tx, record, now)?;
            }
            tx.commit()?;
        }
        self.db.notify(Table::Posts);
        Ok(())
    }

    /// All cached posts, most recently fetched first
    pub fn all(&self) -> Result<Vec<PostRecord>, CacheError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, title, body, author_id, image, posted_at, posted_on
            FROM posts
            ORDER BY fetched_at DESC, id ASC
            "#,
        )?;
        let posts = stmt
            .query_map([], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    /// Get post by id
    pub fn get(&self, id: &str) -> Result<PostRecord, CacheError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, title, body, author_id, image, posted_at, posted_on
            FROM posts
            WHERE id = ?
            "#,
        )?;

        let post = stmt
            .query_row([id], Self::row_to_record)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => CacheError::NotFound,
                other => CacheError::Database(other),
            })?;

        Ok(post)
    }

    /// Like `get`, with absence as `None`
    pub fn find(&self, id: &str) -> Result<Option<PostRecord>, CacheError> {
        match self.get(id) {
            Ok(post) => Ok(Some(post)),
            Err(CacheError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove one post; absent ids are ignored
    pub fn delete(&self, id: &str) -> Result<(), CacheError> {
        let removed = self.db.conn().execute("DELETE FROM posts WHERE id = ?", [id])?;
        if removed > 0 {
            self.db.notify(Table::Posts);
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.db.conn().execute("DELETE FROM posts", [])?;
        self.db.notify(Table::Posts);
        Ok(())
    }

    pub fn count(&self) -> Result<usize, CacheError> {
        let count: i64 = self
            .db
            .conn()
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn write(conn: &Connection, record: &PostRecord, now: i64) -> Result<(), CacheError> {
        conn.execute(
            UPSERT_POST,
            params![
                record.id,
                record.title,
                record.body,
                record.author_id,
                record.image,
                record.posted_at,
                record.posted_on,
                now,
            ],
        )?;
        Ok(())
    }

    /// Convert a database row to a PostRecord
    fn row_to_record(row: &rusqlite::Row) -> Result<PostRecord, rusqlite::Error> {
        Ok(PostRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            body: row.get(2)?,
            author_id: row.get(3)?,
            image: row.get(4)?,
            posted_at: row.get(5)?,
            posted_on: row.get(6)?,
        })
    }
}
