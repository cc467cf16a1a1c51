//! Redis-backed store.
//!
//! Entries are stored as JSON under `{prefix}:{key}`, where `{key}` is the
//! JSON encoding of the [`AnalysisKey`]. JSON string escaping keeps track
//! identifiers containing `:` or `_` from colliding. Writes use `SET NX`,
//! so the server enforces first-writer-wins.
//!
//! One [`ConnectionManager`] is opened on first use and shared by every
//! clone of the store. It multiplexes concurrent commands over a single
//! connection and reconnects on its own after a drop.

use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tokio::sync::OnceCell;

use super::KeyValueStore;
use crate::types::{AnalysisKey, CacheEntry};
use crate::{Result, StorageError};

const DEFAULT_KEY_PREFIX: &str = "muninn";

#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: Arc<OnceCell<ConnectionManager>>,
    key_prefix: String,
}

impl RedisStore {
    /// Create a store for the server at `url` (e.g. `redis://127.0.0.1/`).
    ///
    /// No connection is made until the first call.
    pub fn new(url: &str, key_prefix: Option<String>) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| StorageError::Unavailable(format!("invalid redis URL: {e}")))?;
        Ok(Self {
            client,
            conn: Arc::new(OnceCell::new()),
            key_prefix: key_prefix.unwrap_or_else(|| DEFAULT_KEY_PREFIX.to_owned()),
        })
    }

    fn redis_key(&self, key: &AnalysisKey) -> Result<String> {
        let encoded = serde_json::to_string(key)?;
        Ok(format!("{}:{encoded}", self.key_prefix))
    }

    /// Handle on the shared connection, connecting on first use.
    ///
    /// A failed connect leaves the cell empty so the next call retries.
    async fn connection(&self) -> Result<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(|e| StorageError::Unavailable(format!("connection failed: {e}")))
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn get(&self, key: &AnalysisKey) -> Result<Option<CacheEntry>> {
        let redis_key = self.redis_key(key)?;
        let mut conn = self.connection().await?;
        let raw: Option<String> = conn
            .get(&redis_key)
            .await
            .map_err(|e| StorageError::Unavailable(format!("GET failed: {e}")))?;
        match raw {
            Some(data) => Ok(Some(serde_json::from_str(&data).map_err(|e| {
                StorageError::Unavailable(format!("corrupt entry at {redis_key}: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let redis_key = self.redis_key(&entry.key)?;
        let data = serde_json::to_string(entry)?;
        let mut conn = self.connection().await?;

        // SET NX replies OK when written and nil when the key exists
        let reply: Option<String> = redis::cmd("SET")
            .arg(&redis_key)
            .arg(&data)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| StorageError::Unavailable(format!("SET failed: {e}")))?;

        match reply {
            Some(_) => Ok(()),
            None => Err(StorageError::KeyConflict(entry.key.clone()).into()),
        }
    }
}
