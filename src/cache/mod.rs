//! Result caching in front of the generative model.
//!
//! [`ResultCache`] is the read-through / write-through layer between an
//! analysis request and the model:
//!
//! 1. Look the key up in the [`KeyValueStore`](crate::store::KeyValueStore).
//! 2. On a hit, return the stored payload; the model is not called.
//! 3. On a miss, call the model once, insert the result, return it.
//!
//! Two writers racing on the same key both call the model; the store lets
//! exactly one insert through. What the loser sees is set by
//! [`ConflictPolicy`]. A write that fails because the backend is down is
//! handled per [`WriteFailurePolicy`].
//!
//! The cache performs no logging. Outcomes are reported through the
//! returned [`Provenance`](crate::types::Provenance), structured errors,
//! and the counters in [`telemetry`](crate::telemetry).

mod result;

pub use result::{CachePolicy, ConflictPolicy, ResultCache, WriteFailurePolicy};
