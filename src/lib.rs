//! Muninn - cached emotion analysis of song lyrics
//!
//! Muninn asks a hosted generative model for two kinds of analysis of a
//! track's lyrics:
//!
//! - an **emotion profile**: a distribution over 15 fixed emotion labels
//!   summing to 1.0
//! - **tagged lyrics**: the lyric text with the passages expressing one
//!   emotion wrapped in markup
//!
//! Model calls are slow and billed, so every result is stored under an
//! [`AnalysisKey`] and served from storage on later requests.
//!
//! # Layers
//!
//! - [`store::KeyValueStore`]: insert-only keyed storage
//!   (in-memory, SQLite, Redis)
//! - [`model::GenerativeModel`]: one request/response call to the model
//! - [`ResultCache`]: read-through / write-through between the two
//! - [`BatchCoordinator`]: concurrent fan-out with a 50% success threshold
//! - [`AnalysisService`]: request/response shapes and payload validation
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use muninn::model::{GenerationConfig, ModelSet, PromptSpec, VertexClient};
//! use muninn::store::MemoryStore;
//! use muninn::types::{Operation, ProfileRequest};
//! use muninn::{AnalysisService, BatchCoordinator, ResultCache};
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let client = |op| {
//!         Arc::new(VertexClient::new(
//!             "my-project",
//!             "us-central1",
//!             "gemini-1.5-pro",
//!             PromptSpec::for_operation(op, "Analyse these lyrics:"),
//!             GenerationConfig::default(),
//!         ))
//!     };
//!     let models = ModelSet::new(client(Operation::Profile), client(Operation::Tags));
//!     let cache = ResultCache::new(Arc::new(MemoryStore::new()), models);
//!     let service = AnalysisService::new(BatchCoordinator::new(cache));
//!
//!     let response = service
//!         .emotional_profile(ProfileRequest::new("track-1", "Here comes the sun"))
//!         .await?;
//!     println!("{}", response.emotional_profile.dominant());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod error;
pub mod model;
#[cfg(feature = "server")]
pub mod server;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod version;

// Re-export main types at crate root
pub use batch::{BatchConfig, BatchCoordinator, BatchItem, BatchReport, ItemFailure};
pub use cache::{CachePolicy, ConflictPolicy, ResultCache, WriteFailurePolicy};
pub use error::{ModelError, MuninnError, Result, StorageError};
pub use model::{GenerativeModel, ModelSet};
pub use service::AnalysisService;
pub use store::KeyValueStore;
pub use version::{GIT_SHA, PKG_VERSION, version_string};

pub use types::{
    AggregateProfileResponse, AnalysisKey, CacheEntry, Emotion, EmotionDistribution, Operation,
    Payload, ProfileRequest, ProfileResponse, Provenance, Resolved, TagsRequest, TagsResponse,
};
