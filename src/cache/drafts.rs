// SPDX-License-Identifier: MPL-2.0

use crate::api::NewPost;
use crate::cache::{CacheDb, CacheError, Table};
use rusqlite::params;

/// A post written on this device and not yet published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftRecord {
    /// Local id, assigned on first save
    pub id: i64,
    pub title: String,
    pub body: String,
    pub image: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&DraftRecord> for NewPost {
    fn from(draft: &DraftRecord) -> Self {
        NewPost {
            title: draft.title.clone(),
            body: draft.body.clone(),
            image: draft.image.clone(),
        }
    }
}

/// Cache operations for drafts
pub struct DraftCache<'a> {
    db: &'a CacheDb,
}

impl<'a> DraftCache<'a> {
    pub fn new(db: &'a CacheDb) -> Self {
        Self { db }
    }

    /// Save a new draft and return its id
    pub fn insert(&self, draft: &NewPost) -> Result<i64, CacheError> {
        let id = {
            let conn = self.db.conn();
            let now = CacheDb::now();
            conn.execute(
                r#"
                INSERT INTO drafts (title, body, image, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?4)
                "#,
                params![draft.title, draft.body, draft.image, now],
            )?;
            conn.last_insert_rowid()
        };
        self.db.notify(Table::Drafts);
        Ok(id)
    }

    /// Overwrite the content of an existing draft
    pub fn update(&self, id: i64, draft: &NewPost) -> Result<(), CacheError> {
        let changed = self.db.conn().execute(
            r#"
            UPDATE drafts
            SET title = ?1, body = ?2, image = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
            params![draft.title, draft.body, draft.image, CacheDb::now(), id],
        )?;
        if changed == 0 {
            return Err(CacheError::NotFound);
        }
        self.db.notify(Table::Drafts);
        Ok(())
    }

    /// All drafts, most recently edited first
    pub fn all(&self) -> Result<Vec<DraftRecord>, CacheError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, title, body, image, created_at, updated_at
            FROM drafts
            ORDER BY updated_at DESC, id DESC
            "#,
        )?;
        let drafts = stmt
            .query_map([], Self::row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(drafts)
    }

    pub fn get(&self, id: i64) -> Result<Option<DraftRecord>, CacheError> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(
            r#"
            SELECT id, title, body, image, created_at, updated_at
            FROM drafts
            WHERE id = ?
            "#,
        )?;
        match stmt.query_row([id], Self::row_to_record) {
            Ok(draft) => Ok(Some(draft)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns whether a draft was removed
    pub fn delete(&self, id: i64) -> Result<bool, CacheError> {
        let removed = self
            .db
            .conn()
            .execute("DELETE FROM drafts WHERE id = ?", [id])?;
        if removed > 0 {
            self.db.notify(Table::Drafts);
        }
        Ok(removed > 0)
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.db.conn().execute("DELETE FROM drafts", [])?;
        self.db.notify(Table::Drafts);
        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row) -> Result<DraftRecord, rusqlite::Error> {
        Ok(DraftRecord {
            id: row.get(0)?,
            title: row.get(1)?,
            body: row.get(2)?,
            image: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_post(title: &str) -> NewPost {
        NewPost {
            title: title.to_string(),
            body: "draft body".to_string(),
            image: None,
        }
    }

    #[test]
    fn insert_assigns_distinct_ids() {
        let db = CacheDb::open_in_memory().unwrap();
        let cache = DraftCache::new(&db);
        let a = cache.insert(&new_post("a")).unwrap();
        let b = cache.insert(&new_post("b")).unwrap();
        assert_ne!(a, b);
        assert_eq!(cache.all().unwrap().len(), 2);
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let db = CacheDb::open_in_memory().unwrap();
        let cache = DraftCache::new(&db);
        let a = cache.insert(&new_post("a")).unwrap();
        assert!(cache.delete(a).unwrap());
        let b = cache.insert(&new_post("b")).unwrap();
        assert!(b > a);
    }

    #[test]
    fn update_changes_content() {
        let db = CacheDb::open_in_memory().unwrap();
        let cache = DraftCache::new(&db);
        let id = cache.insert(&new_post("before")).unwrap();
        cache.update(id, &new_post("after")).unwrap();
        assert_eq!(cache.get(id).unwrap().unwrap().title, "after");
    }

    #[test]
    fn update_missing_draft_is_not_found() {
        let db = CacheDb::open_in_memory().unwrap();
        let cache = DraftCache::new(&db);
        assert!(matches!(
            cache.update(42, &new_post("x")),
            Err(CacheError::NotFound)
        ));
    }

    #[test]
    fn delete_missing_draft_reports_false() {
        let db = CacheDb::open_in_memory().unwrap();
        let cache = DraftCache::new(&db);
        assert!(!cache.delete(7).unwrap());
        assert_eq!(cache.get(7).unwrap(), None);
    }
}
