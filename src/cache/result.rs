use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::model::ModelSet;
use crate::store::KeyValueStore;
use crate::telemetry;
use crate::types::{AnalysisKey, CacheEntry, Provenance, Resolved};
use crate::{MuninnError, Result, StorageError};

/// What a writer does when another writer stored the key first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Re-read the key and return the winner's value.
    #[default]
    Converge,
    /// Surface [`StorageError::KeyConflict`] to the caller.
    Reject,
}

/// What a writer does when the store is unavailable for the insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteFailurePolicy {
    /// The resolution fails with the storage error.
    #[default]
    Fail,
    /// Return the generated payload anyway, marked
    /// [`Provenance::Unpersisted`].
    BestEffort,
}

/// Policies applied by [`ResultCache`] after a model call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachePolicy {
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
    #[serde(default)]
    pub on_write_failure: WriteFailurePolicy,
}

impl CachePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_conflict(mut self, policy: ConflictPolicy) -> Self {
        self.on_conflict = policy;
        self
    }

    pub fn on_write_failure(mut self, policy: WriteFailurePolicy) -> Self {
        self.on_write_failure = policy;
        self
    }
}

/// Store-backed cache of model results, keyed by [`AnalysisKey`].
///
/// Cheap to clone; clones share the store and the model adapters.
#[derive(Clone)]
pub struct ResultCache {
    store: Arc<dyn KeyValueStore>,
    models: ModelSet,
    policy: CachePolicy,
}

impl ResultCache {
    pub fn new(store: Arc<dyn KeyValueStore>, models: ModelSet) -> Self {
        Self {
            store,
            models,
            policy: CachePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Return the payload for `key`, generating it from `prompt_input` on a miss.
    ///
    /// Exactly one model call and one store write per miss. Model errors
    /// and read errors are returned as-is; write errors follow the
    /// configured [`CachePolicy`].
    pub async fn resolve(&self, key: &AnalysisKey, prompt_input: &str) -> Result<Resolved> {
        let operation = key.operation().as_str();

        if let Some(entry) = self.store.get(key).await? {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => operation).increment(1);
            return Ok(Resolved {
                key: entry.key,
                payload: entry.payload,
                provenance: Provenance::Hit,
            });
        }
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => operation).increment(1);

        let model = self.models.for_operation(key.operation());
        let payload = match model.generate(prompt_input).await {
            Ok(payload) => {
                metrics::counter!(
                    telemetry::MODEL_INVOCATIONS_TOTAL,
                    "operation" => operation,
                    "status" => "ok"
                )
                .increment(1);
                payload
            }
            Err(e) => {
                metrics::counter!(
                    telemetry::MODEL_INVOCATIONS_TOTAL,
                    "operation" => operation,
                    "status" => "error"
                )
                .increment(1);
                return Err(e);
            }
        };

        let entry = CacheEntry::new(key.clone(), payload);
        match self.store.put(&entry).await {
            Ok(()) => Ok(Resolved {
                key: entry.key,
                payload: entry.payload,
                provenance: Provenance::Generated,
            }),
            Err(e) if e.is_key_conflict() => {
                metrics::counter!(telemetry::STORE_CONFLICTS_TOTAL, "operation" => operation)
                    .increment(1);
                match self.policy.on_conflict {
                    ConflictPolicy::Reject => Err(e),
                    ConflictPolicy::Converge => self.converge(entry).await,
                }
            }
            Err(MuninnError::Storage(StorageError::Unavailable(reason))) => {
                metrics::counter!(telemetry::STORE_WRITE_FAILURES_TOTAL, "operation" => operation)
                    .increment(1);
                match self.policy.on_write_failure {
                    WriteFailurePolicy::Fail => Err(StorageError::Unavailable(reason).into()),
                    WriteFailurePolicy::BestEffort => Ok(unpersisted(entry)),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Run [`resolve`](Self::resolve) on its own task.
    ///
    /// The task keeps running if the returned handle is dropped, so a
    /// cancelled caller still leaves the result in the store for the next
    /// request.
    pub fn spawn_resolve(
        &self,
        key: AnalysisKey,
        prompt_input: String,
    ) -> JoinHandle<Result<Resolved>> {
        let cache = self.clone();
        tokio::spawn(async move { cache.resolve(&key, &prompt_input).await })
    }

    /// [`spawn_resolve`](Self::spawn_resolve) and wait for the outcome.
    pub async fn resolve_detached(&self, key: AnalysisKey, prompt_input: String) -> Result<Resolved> {
        self.spawn_resolve(key, prompt_input).await?
    }

    /// Lost an insert race: hand back whatever the winner stored.
    async fn converge(&self, ours: CacheEntry) -> Result<Resolved> {
        match self.store.get(&ours.key).await? {
            Some(winner) => Ok(Resolved {
                key: winner.key,
                payload: winner.payload,
                provenance: Provenance::Converged,
            }),
            // winner already evicted; nothing to converge on
            None => Ok(unpersisted(ours)),
        }
    }
}

fn unpersisted(entry: CacheEntry) -> Resolved {
    Resolved {
        key: entry.key,
        payload: entry.payload,
        provenance: Provenance::Unpersisted,
    }
}
