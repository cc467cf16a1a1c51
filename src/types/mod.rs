//! Public types for the muninn API.

mod emotion;
mod key;
mod payload;
mod request;

pub use emotion::{Emotion, EmotionDistribution, SUM_TOLERANCE};
pub use key::{AnalysisKey, Operation};
pub use payload::{CacheEntry, Payload, Provenance, Resolved};
pub use request::{
    AggregateProfileResponse, ProfileRequest, ProfileResponse, TagsRequest, TagsResponse,
};
