// SPDX-License-Identifier: MPL-2.0

/// SQL schema for the cache database
pub const SCHEMA: &str = r#"
-- Database version for migrations
PRAGMA user_version = 1;

-- posts: scalar fields only; comments, views and likes are not cached
CREATE TABLE IF NOT EXISTS posts (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    author_id TEXT NOT NULL,
    image TEXT,
    posted_at TEXT NOT NULL,
    posted_on TEXT NOT NULL,
    fetched_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id);

-- drafts: device-local, integer ids never shared with the server
CREATE TABLE IF NOT EXISTS drafts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    image TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- followers / following: two independent replicas with the same shape
CREATE TABLE IF NOT EXISTS followers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    username TEXT NOT NULL,
    image TEXT,
    bio TEXT,
    fetched_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS following (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    username TEXT NOT NULL,
    image TEXT,
    bio TEXT,
    fetched_at INTEGER NOT NULL
);

-- likes: presence means the user liked the target
CREATE TABLE IF NOT EXISTS likes (
    user_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    target_kind TEXT NOT NULL,
    liked_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, target_id)
);

CREATE INDEX IF NOT EXISTS idx_likes_target ON likes(target_id);
"#;
