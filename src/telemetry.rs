//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn operations. The daemon (or any
//! embedding application) installs its own `metrics` recorder; without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `operation`: analysis kind: "profile" or "tags"
//! - `status`: outcome: "ok" or "error"

/// Store lookups that found an entry.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Store lookups that found nothing.
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Calls to the generative model.
///
/// Labels: `operation`, `status` ("ok" | "error").
pub const MODEL_INVOCATIONS_TOTAL: &str = "muninn_model_invocations_total";

/// Writes rejected because another writer stored the key first.
///
/// Labels: `operation`.
pub const STORE_CONFLICTS_TOTAL: &str = "muninn_store_conflicts_total";

/// Writes that failed with the backend unavailable.
///
/// Labels: `operation`.
pub const STORE_WRITE_FAILURES_TOTAL: &str = "muninn_store_write_failures_total";

/// Batch items processed, counted per submitted item.
///
/// Labels: `status` ("ok" | "error").
pub const BATCH_ITEMS_TOTAL: &str = "muninn_batch_items_total";

/// Batches failed by the minimum-success policy.
pub const BATCHES_REJECTED_TOTAL: &str = "muninn_batches_rejected_total";
