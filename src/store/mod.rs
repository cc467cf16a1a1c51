//! Durable keyed storage for analysis results.
//!
//! Backends implement [`KeyValueStore`]; the [`ResultCache`](crate::cache::ResultCache)
//! only relies on the trait contract:
//!
//! - `get` never fails on "not found". It returns `Ok(None)`.
//! - `put` is insert-only. Writing a key that already holds a value returns
//!   [`StorageError::KeyConflict`](crate::StorageError::KeyConflict) and
//!   leaves the existing value unchanged. Backend failures surface as
//!   [`StorageError::Unavailable`](crate::StorageError::Unavailable).
//! - Each call is atomic on its own; no multi-key transactions.
//!
//! Uniqueness is enforced by the backend itself, so callers share one
//! store across concurrent resolutions without in-process locking.
//!
//! # Backends
//!
//! - [`MemoryStore`]: moka-backed, process-local.
//! - [`SqliteStore`] (`sqlite` feature): one table per operation.
//! - [`RedisStore`] (`redis` feature): `SET NX` on a key-value server.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::Result;
use crate::types::{AnalysisKey, CacheEntry};

/// Keyed, insert-only storage of [`CacheEntry`] values.
///
/// [`StorageError::KeyConflict`]: crate::StorageError::KeyConflict
/// [`StorageError::Unavailable`]: crate::StorageError::Unavailable
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Backend name for diagnostics.
    fn name(&self) -> &str;

    /// Look up the entry for `key`.
    async fn get(&self, key: &AnalysisKey) -> Result<Option<CacheEntry>>;

    /// Insert `entry` under `entry.key`, failing with `KeyConflict` if the
    /// key is already present.
    async fn put(&self, entry: &CacheEntry) -> Result<()>;
}
