// SPDX-License-Identifier: MIT

//! Content store for fetched social-media items and audit logs

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use crate::audit::Verdict;
use crate::{Result, VetterError};

/// Which collection a fetched item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    Post,
    Like,
    Bookmark,
}

impl CollectionType {
    pub const ALL: [CollectionType; 3] = [Self::Post, Self::Like, Self::Bookmark];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Like => "like",
            Self::Bookmark => "bookmark",
        }
    }

    /// Human label used in reports ("Post", "Like", "Bookmark")
    pub fn label(&self) -> &'static str {
        match self {
            Self::Post => "Post",
            Self::Like => "Like",
            Self::Bookmark => "Bookmark",
        }
    }
}

impl std::fmt::Display for CollectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CollectionType {
    type Err = VetterError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "post" => Ok(Self::Post),
            "like" => Ok(Self::Like),
            "bookmark" => Ok(Self::Bookmark),
            other => Err(VetterError::Storage(format!(
                "Unknown collection type: {}",
                other
            ))),
        }
    }
}

/// A single fetched unit of content (post, like, or bookmark)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Platform-assigned identifier, unique within its collection
    pub id: String,
    pub collection: CollectionType,
    /// Raw text, may be empty; never truncated at storage time
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Present for likes/bookmarks, which belong to other authors
    pub author_handle: Option<String>,
}

/// The authenticated user's profile, refreshed on each fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub name: String,
    pub description: Option<String>,
    pub followers_count: i64,
    pub following_count: i64,
    pub tweet_count: i64,
}

/// Per-collection item counts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub posts: i64,
    pub likes: i64,
    pub bookmarks: i64,
}

/// Content store backed by SQLite (thread-safe wrapper)
#[derive(Clone)]
pub struct ContentStore {
    conn: Arc<Mutex<Connection>>,
}

impl ContentStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Open an existing store; fails if the file is missing instead of
    /// silently creating an empty database.
    pub fn open_existing<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(VetterError::Storage(format!(
                "Database not found at {:?}. Run `vetter fetch` first",
                path
            )));
        }
        Self::open(path)
    }

    /// Open an in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.initialize()?;
        Ok(store)
    }

    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| VetterError::Storage("Database lock poisoned".to_string()))
    }

    /// Initialize database schema
    fn initialize(&self) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id TEXT NOT NULL,
                collection TEXT NOT NULL,
                text TEXT NOT NULL DEFAULT '',
                author_handle TEXT,
                created_at TEXT,
                fetched_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (id, collection)
            );

            CREATE TABLE IF NOT EXISTS user_profile (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                followers_count INTEGER NOT NULL DEFAULT 0,
                following_count INTEGER NOT NULL DEFAULT 0,
                tweet_count INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE TABLE IF NOT EXISTS audit_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                item_type TEXT NOT NULL,
                item_id TEXT NOT NULL,
                flagged INTEGER NOT NULL,
                severity TEXT NOT NULL,
                categories TEXT NOT NULL DEFAULT '[]',
                reason TEXT,
                model TEXT,
                logged_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_items_collection ON items(collection);
            CREATE INDEX IF NOT EXISTS idx_audit_logs_run ON audit_logs(run_id);
            CREATE INDEX IF NOT EXISTS idx_audit_logs_item ON audit_logs(item_type, item_id);
        "#,
        )?;
        Ok(())
    }

    /// Insert or overwrite an item, keyed by (id, collection).
    /// Re-inserting is not an error; this is what makes repeated fetches
    /// idempotent. The rowid is preserved on conflict so insertion order
    /// stays stable.
    pub fn upsert_item(&self, item: &ContentItem) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"INSERT INTO items (id, collection, text, author_handle, created_at, fetched_at)
               VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))
               ON CONFLICT(id, collection) DO UPDATE SET
                   text = excluded.text,
                   author_handle = excluded.author_handle,
                   created_at = excluded.created_at,
                   fetched_at = excluded.fetched_at"#,
            params![
                item.id,
                item.collection.as_str(),
                item.text,
                item.author_handle,
                item.created_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    /// Items of one collection in insertion order, optionally limited
    pub fn items_by_type(
        &self,
        collection: CollectionType,
        limit: Option<usize>,
    ) -> Result<Vec<ContentItem>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, collection, text, author_handle, created_at
               FROM items WHERE collection = ?1 ORDER BY rowid LIMIT ?2"#,
        )?;

        // SQLite treats LIMIT -1 as unlimited
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let items = stmt
            .query_map(params![collection.as_str(), limit], |row| {
                let collection_str: String = row.get(1)?;
                let created_str: Option<String> = row.get(4)?;
                Ok(ContentItem {
                    id: row.get(0)?,
                    collection: CollectionType::from_str(&collection_str)
                        .unwrap_or(CollectionType::Post),
                    text: row.get(2)?,
                    author_handle: row.get(3)?,
                    created_at: created_str.and_then(|s| {
                        DateTime::parse_from_rfc3339(&s)
                            .ok()
                            .map(|dt| dt.with_timezone(&Utc))
                    }),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// Number of stored items in one collection
    pub fn count(&self, collection: CollectionType) -> Result<i64> {
        let conn = self.lock_conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM items WHERE collection = ?1",
            params![collection.as_str()],
            |row| row.get(0),
        )
        .map_err(Into::into)
    }

    /// Insert or update the authenticated user's profile
    pub fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"INSERT OR REPLACE INTO user_profile (
                   id, username, name, description,
                   followers_count, following_count, tweet_count, updated_at
               ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, datetime('now'))"#,
            params![
                profile.id,
                profile.username,
                profile.name,
                profile.description,
                profile.followers_count,
                profile.following_count,
                profile.tweet_count,
            ],
        )?;
        Ok(())
    }

    /// Record one audit-log row per verdict for a run
    pub fn log_verdicts(&self, run_id: &str, model: &str, verdicts: &[Verdict]) -> Result<()> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"INSERT INTO audit_logs (run_id, item_type, item_id, flagged, severity, categories, reason, model)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
        )?;
        for v in verdicts {
            let categories = serde_json::to_string(
                &v.categories.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
            )?;
            stmt.execute(params![
                run_id,
                v.collection.as_str(),
                v.item_id,
                v.is_flagged() as i64,
                v.severity.as_str(),
                categories,
                v.reason,
                model,
            ])?;
        }
        Ok(())
    }

    /// Database statistics
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(StoreStats {
            posts: self.count(CollectionType::Post)?,
            likes: self.count(CollectionType::Like)?,
            bookmarks: self.count(CollectionType::Bookmark)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, collection: CollectionType, text: &str) -> ContentItem {
        ContentItem {
            id: id.to_string(),
            collection,
            text: text.to_string(),
            created_at: None,
            author_handle: None,
        }
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let store = ContentStore::in_memory().unwrap();
        let x = item("100", CollectionType::Post, "hello");

        store.upsert_item(&x).unwrap();
        store.upsert_item(&x).unwrap();

        assert_eq!(store.count(CollectionType::Post).unwrap(), 1);
        let items = store.items_by_type(CollectionType::Post, None).unwrap();
        assert_eq!(items, vec![x]);
    }

    #[test]
    fn test_upsert_overwrites_by_id() {
        let store = ContentStore::in_memory().unwrap();
        store
            .upsert_item(&item("100", CollectionType::Post, "first"))
            .unwrap();
        store
            .upsert_item(&item("100", CollectionType::Post, "second"))
            .unwrap();

        let items = store.items_by_type(CollectionType::Post, None).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "second");
    }

    #[test]
    fn test_same_id_different_collections() {
        let store = ContentStore::in_memory().unwrap();
        store
            .upsert_item(&item("100", CollectionType::Post, "a post"))
            .unwrap();
        store
            .upsert_item(&item("100", CollectionType::Like, "a like"))
            .unwrap();

        assert_eq!(store.count(CollectionType::Post).unwrap(), 1);
        assert_eq!(store.count(CollectionType::Like).unwrap(), 1);
    }

    #[test]
    fn test_query_preserves_insertion_order() {
        let store = ContentStore::in_memory().unwrap();
        for i in 0..5 {
            store
                .upsert_item(&item(&format!("{}", i), CollectionType::Like, "t"))
                .unwrap();
        }
        // Overwriting an early item must not move it to the end
        store
            .upsert_item(&item("1", CollectionType::Like, "updated"))
            .unwrap();

        let ids: Vec<String> = store
            .items_by_type(CollectionType::Like, None)
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_limit_is_deterministic() {
        let store = ContentStore::in_memory().unwrap();
        for i in 0..10 {
            store
                .upsert_item(&item(&format!("{}", i), CollectionType::Post, "t"))
                .unwrap();
        }

        let first = store.items_by_type(CollectionType::Post, Some(3)).unwrap();
        let second = store.items_by_type(CollectionType::Post, Some(3)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn test_open_existing_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.db");
        match ContentStore::open_existing(&missing) {
            Err(VetterError::Storage(_)) => {}
            other => panic!("Expected Storage error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_stats() {
        let store = ContentStore::in_memory().unwrap();
        store
            .upsert_item(&item("1", CollectionType::Post, ""))
            .unwrap();
        store
            .upsert_item(&item("2", CollectionType::Bookmark, ""))
            .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.posts, 1);
        assert_eq!(stats.likes, 0);
        assert_eq!(stats.bookmarks, 1);
    }
}
