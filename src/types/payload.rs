//! Cached payloads and resolution results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AnalysisKey;

/// Model output as stored by the cache.
///
/// The cache treats payloads as opaque: a structured JSON object for
/// profiles, plain text for tagged lyrics. Interpretation (and validation)
/// happens in [`AnalysisService`](crate::service::AnalysisService).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Payload {
    Structured(serde_json::Value),
    Text(String),
}

impl Payload {
    pub fn as_structured(&self) -> Option<&serde_json::Value> {
        match self {
            Payload::Structured(v) => Some(v),
            Payload::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            Payload::Structured(_) => None,
        }
    }

    /// Short shape name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Structured(_) => "structured",
            Payload::Text(_) => "text",
        }
    }
}

/// A stored analysis. Created once on the first successful generation for
/// its key and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: AnalysisKey,
    pub payload: Payload,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    /// New entry stamped with the current time.
    pub fn new(key: AnalysisKey, payload: Payload) -> Self {
        Self {
            key,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Where a resolved payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Read from the store; the model was not called.
    Hit,
    /// Generated by the model and persisted.
    Generated,
    /// Generated, but another writer stored the key first; the winner's
    /// value was returned.
    Converged,
    /// Generated, but the write failed and the cache runs best-effort.
    Unpersisted,
}

/// Outcome of resolving a single key.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub key: AnalysisKey,
    pub payload: Payload,
    pub provenance: Provenance,
}

impl Resolved {
    /// Whether this resolution invoked the model.
    pub fn invoked_model(&self) -> bool {
        !matches!(self.provenance, Provenance::Hit)
    }
}
