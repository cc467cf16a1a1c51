//! Concurrent fan-out of independent resolutions.
//!
//! [`BatchCoordinator::resolve_batch`] dispatches one
//! [`ResultCache::resolve`] per distinct key, waits for all of them, and
//! partitions the outcomes. A failing item never cancels its siblings.
//!
//! The batch as a whole is accepted when `succeeded >= total / 2`
//! (integer division). Below that, the call fails with
//! [`MuninnError::BatchBelowThreshold`] carrying both counts.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::cache::ResultCache;
use crate::telemetry;
use crate::types::{AnalysisKey, Resolved};
use crate::{MuninnError, Result};

/// Default number of resolutions in flight per batch.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Upper bound on resolutions in flight for one batch. Default: 16.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }
}

/// One unit of work: a key and the prompt input used on a miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub key: AnalysisKey,
    pub prompt_input: String,
}

impl BatchItem {
    pub fn new(key: AnalysisKey, prompt_input: impl Into<String>) -> Self {
        Self {
            key,
            prompt_input: prompt_input.into(),
        }
    }
}

/// A successful item. `index` is its position in the submitted batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSuccess {
    pub index: usize,
    pub resolved: Resolved,
}

/// A failed item. `index` is its position in the submitted batch.
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub index: usize,
    pub key: AnalysisKey,
    pub error: MuninnError,
}

/// Outcome of a batch that met the success threshold.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// In submission order.
    pub successes: Vec<BatchSuccess>,
    /// In submission order. Not surfaced to clients.
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.successes.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded() + self.failed()
    }
}

/// Whether `succeeded` out of `total` is enough to accept a batch.
pub fn meets_threshold(succeeded: usize, total: usize) -> bool {
    succeeded >= total / 2
}

/// Fans batches out through a [`ResultCache`].
#[derive(Clone)]
pub struct BatchCoordinator {
    cache: ResultCache,
    config: BatchConfig,
}

impl BatchCoordinator {
    pub fn new(cache: ResultCache) -> Self {
        Self {
            cache,
            config: BatchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Resolve every item and apply the success threshold.
    ///
    /// Items sharing a key are resolved once and share the outcome, so
    /// duplicates count once per submitted item. Resolutions run on
    /// spawned tasks: if this future is dropped, in-flight work still
    /// finishes and populates the store.
    pub async fn resolve_batch(&self, items: Vec<BatchItem>) -> Result<BatchReport> {
        let total = items.len();

        let mut slot_by_key: HashMap<AnalysisKey, usize> = HashMap::new();
        let mut distinct: Vec<BatchItem> = Vec::new();
        let mut slots = Vec::with_capacity(total);
        for item in &items {
            let slot = *slot_by_key.entry(item.key.clone()).or_insert_with(|| {
                distinct.push(item.clone());
                distinct.len() - 1
            });
            slots.push(slot);
        }

        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let handles: Vec<_> = distinct
            .into_iter()
            .map(|item| {
                let cache = self.cache.clone();
                let permits = Arc::clone(&permits);
                tokio::spawn(async move {
                    let _permit = permits
                        .acquire_owned()
                        .await
                        .map_err(|e| MuninnError::TaskFailed(e.to_string()))?;
                    cache.resolve(&item.key, &item.prompt_input).await
                })
            })
            .collect();

        let outcomes: Vec<Result<Resolved>> = futures_util::future::join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap_or_else(|e| Err(e.into())))
            .collect();

        let mut report = BatchReport::default();
        for (index, (item, slot)) in items.into_iter().zip(slots).enumerate() {
            match &outcomes[slot] {
                Ok(resolved) => report.successes.push(BatchSuccess {
                    index,
                    resolved: resolved.clone(),
                }),
                Err(error) => report.failures.push(ItemFailure {
                    index,
                    key: item.key,
                    error: error.clone(),
                }),
            }
        }

        metrics::counter!(telemetry::BATCH_ITEMS_TOTAL, "status" => "ok")
            .increment(report.succeeded() as u64);
        metrics::counter!(telemetry::BATCH_ITEMS_TOTAL, "status" => "error")
            .increment(report.failed() as u64);

        if !meets_threshold(report.succeeded(), total) {
            metrics::counter!(telemetry::BATCHES_REJECTED_TOTAL).increment(1);
            return Err(MuninnError::BatchBelowThreshold {
                succeeded: report.succeeded(),
                failed: report.failed(),
            });
        }

        Ok(report)
    }
}
