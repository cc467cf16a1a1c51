//! In-memory store on top of moka.

use async_trait::async_trait;
use moka::future::Cache;

use super::KeyValueStore;
use crate::types::{AnalysisKey, CacheEntry};
use crate::{Result, StorageError};

/// Process-local [`KeyValueStore`].
///
/// Insert-if-absent goes through moka's entry API, which is atomic per
/// key, so concurrent writers of one key see exactly one winner. Without a
/// capacity the store never evicts; with one, moka evicts by its LRU/LFU
/// policy and an evicted key simply becomes a miss again.
pub struct MemoryStore {
    entries: Cache<AnalysisKey, CacheEntry>,
}

impl MemoryStore {
    /// Unbounded store.
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().build(),
        }
    }

    /// Store holding at most `max` entries.
    pub fn with_max_entries(max: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max).build(),
        }
    }

    /// Number of entries currently stored.
    ///
    /// moka updates counts lazily; call after pending tasks have run for an
    /// exact figure.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get(&self, key: &AnalysisKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key).await)
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let stored = self
            .entries
            .entry(entry.key.clone())
            .or_insert(entry.clone())
            .await;
        if stored.is_fresh() {
            Ok(())
        } else {
            Err(StorageError::KeyConflict(entry.key.clone()).into())
        }
    }
}
