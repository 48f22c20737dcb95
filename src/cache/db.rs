// SPDX-License-Identifier: MPL-2.0

use crate::cache::CacheError;
use crate::cache::schema::SCHEMA;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

/// Buffered change notifications before slow live queries start lagging
const CHANGE_BUS_CAPACITY: usize = 64;

/// Cache tables, used to tell live queries what changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Posts,
    Drafts,
    Followers,
    Following,
    Likes,
}

/// Handle to the cache database, shared by every repository
#[derive(Clone)]
pub struct CacheDb {
    conn: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<Table>,
}

impl CacheDb {
    /// Open or create the cache database at `path`
    pub fn open(path: &Path) -> Result<Self, CacheError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::Path(format!("failed to create cache dir: {}", e)))?;
        }

        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened cache database");
        Self::from_connection(conn)
    }

    /// Throwaway database, used by tests and when no data dir is available
    pub fn open_in_memory() -> Result<Self, CacheError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CacheError> {
        Self::migrate(&conn)?;
        let (changes, _) = broadcast::channel(CHANGE_BUS_CAPACITY);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            changes,
        })
    }

    /// Run schema migrations
    fn migrate(conn: &Connection) -> Result<(), CacheError> {
        // Execute the schema (all CREATE IF NOT EXISTS)
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Access connection for operations
    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("cache lock poisoned")
    }

    /// Get current unix timestamp
    pub fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Subscribe to table change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<Table> {
        self.changes.subscribe()
    }

    /// Tell live queries that `table` changed. Call after the write has committed.
    pub fn notify(&self, table: Table) {
        // No receivers just means nobody is watching
        let _ = self.changes.send(table);
    }

    /// Run blocking cache work on tokio's blocking pool.
    pub async fn call<F, T>(&self, f: F) -> Result<T, CacheError>
    where
        F: FnOnce(&CacheDb) -> Result<T, CacheError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| CacheError::Background(e.to_string()))?
    }
}
