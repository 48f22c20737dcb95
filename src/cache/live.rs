// SPDX-License-Identifier: MPL-2.0

//! Continuously-updated query results.
//!
//! A `LiveQuery` owns a background task that runs its query once, then again
//! every time one of the tables it reads from is written. Each result is
//! published on a `watch` channel, so a slow consumer only ever sees the
//! newest snapshot. Dropping the `LiveQuery` stops the task.

use crate::cache::{CacheDb, CacheError, Table};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tracing::{debug, error};

pub struct LiveQuery<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T> LiveQuery<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start watching `query` over `tables`. Must be called inside a Tokio runtime.
    pub fn spawn<F>(db: &CacheDb, tables: &'static [Table], query: F) -> Self
    where
        F: Fn(&CacheDb) -> Result<T, CacheError> + Send + Sync + 'static,
    {
        let (tx, rx) = watch::channel(None);
        // Subscribe before the first run so no write can slip in between
        let mut changes = db.subscribe();
        let query = Arc::new(query);
        let db = db.clone();

        tokio::spawn(async move {
            loop {
                let run = Arc::clone(&query);
                match db.call(move |db| run(db)).await {
                    Ok(value) => {
                        if tx.send(Some(value)).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(?tables, error = %e, "live query failed, closing stream");
                        break;
                    }
                }

                let rerun = loop {
                    tokio::select! {
                        _ = tx.closed() => break false,
                        change = changes.recv() => match change {
                            Ok(table) if tables.contains(&table) => break true,
                            Ok(_) => continue,
                            // Missed notifications; a rerun catches up
                            Err(RecvError::Lagged(_)) => break true,
                            Err(RecvError::Closed) => break false,
                        },
                    }
                };
                if !rerun {
                    break;
                }
            }
            debug!(?tables, "live query stopped");
        });

        Self { rx }
    }
}

impl<T: Clone> LiveQuery<T> {
    /// Wait for the next snapshot. `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }

    /// Most recent snapshot, if the first run has finished
    pub fn latest(&self) -> Option<T> {
        self.rx.borrow().clone()
    }

    /// Apply `f` to every snapshot of this stream
    pub fn map<U, F>(self, f: F) -> LiveQuery<U>
    where
        T: Send + Sync + 'static,
        U: Clone + Send + Sync + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let mut source = self;
        let (tx, rx) = watch::channel(source.latest().map(&f));
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    next = source.next() => match next {
                        Some(value) => {
                            if tx.send(Some(f(value))).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });
        LiveQuery { rx }
    }
}
