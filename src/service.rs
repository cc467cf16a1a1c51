//! Request-level analysis operations.
//!
//! [`AnalysisService`] maps validated requests onto cache keys and prompt
//! inputs, and maps resolved payloads back onto response shapes. Payload
//! validation happens here, after the cache returns: a profile must parse
//! into a complete [`EmotionDistribution`] that passes
//! [`validate`](EmotionDistribution::validate), and tagged lyrics must be
//! text. A stored entry that fails validation is reported, never repaired.

use tracing::{debug, warn};

use crate::batch::{BatchCoordinator, BatchItem, BatchReport, meets_threshold};
use crate::cache::ResultCache;
use crate::types::{
    AggregateProfileResponse, EmotionDistribution, Payload, ProfileRequest, ProfileResponse,
    TagsRequest, TagsResponse,
};
use crate::{MuninnError, Result};

#[derive(Clone)]
pub struct AnalysisService {
    batch: BatchCoordinator,
}

impl AnalysisService {
    pub fn new(batch: BatchCoordinator) -> Self {
        Self { batch }
    }

    pub fn cache(&self) -> &ResultCache {
        self.batch.cache()
    }

    /// Emotion profile of one track.
    pub async fn emotional_profile(&self, request: ProfileRequest) -> Result<ProfileResponse> {
        let resolved = self
            .cache()
            .resolve_detached(request.key(), request.prompt_input())
            .await?;
        debug!(key = %resolved.key, provenance = ?resolved.provenance, "profile resolved");
        let emotional_profile = decode_profile(&resolved.payload)?;
        Ok(ProfileResponse {
            track_id: request.track_id,
            lyrics: request.lyrics,
            emotional_profile,
        })
    }

    /// Lyrics of one track tagged for one emotion.
    ///
    /// Cached per `(track_id, emotion)`: a later request with different
    /// lyrics for the same pair gets the stored result.
    pub async fn emotional_tags(&self, request: TagsRequest) -> Result<TagsResponse> {
        let resolved = self
            .cache()
            .resolve_detached(request.key(), request.prompt_input())
            .await?;
        debug!(key = %resolved.key, provenance = ?resolved.provenance, "tags resolved");
        let lyrics = decode_tags(&resolved.payload)?;
        Ok(TagsResponse {
            track_id: request.track_id,
            lyrics,
            emotion: request.emotion,
        })
    }

    /// Profiles for many tracks. Failed items are dropped from the result
    /// as long as at least half of the batch succeeds.
    pub async fn emotional_profiles_batch(
        &self,
        requests: Vec<ProfileRequest>,
    ) -> Result<Vec<ProfileResponse>> {
        let items = requests
            .iter()
            .map(|r| BatchItem::new(r.key(), r.prompt_input()))
            .collect();
        let report = self.batch.resolve_batch(items).await?;
        let total = requests.len();

        let mut slots: Vec<Option<ProfileRequest>> = requests.into_iter().map(Some).collect();
        let outcomes = report.successes.iter().map(|s| {
            let request = slots[s.index].take();
            (request, decode_profile(&s.resolved.payload))
        });
        collect_validated(total, &report, outcomes, |request, profile| ProfileResponse {
            track_id: request.track_id,
            lyrics: request.lyrics,
            emotional_profile: profile,
        })
    }

    /// Tagged lyrics for many `(track, emotion)` pairs, with the same
    /// threshold rule as [`emotional_profiles_batch`](Self::emotional_profiles_batch).
    pub async fn emotional_tags_batch(
        &self,
        requests: Vec<TagsRequest>,
    ) -> Result<Vec<TagsResponse>> {
        let items = requests
            .iter()
            .map(|r| BatchItem::new(r.key(), r.prompt_input()))
            .collect();
        let report = self.batch.resolve_batch(items).await?;
        let total = requests.len();

        let mut slots: Vec<Option<TagsRequest>> = requests.into_iter().map(Some).collect();
        let outcomes = report.successes.iter().map(|s| {
            let request = slots[s.index].take();
            (request, decode_tags(&s.resolved.payload))
        });
        collect_validated(total, &report, outcomes, |request, lyrics| TagsResponse {
            track_id: request.track_id,
            lyrics,
            emotion: request.emotion,
        })
    }

    /// Label-wise mean profile over the tracks that resolved.
    pub async fn aggregate_profile(
        &self,
        requests: Vec<ProfileRequest>,
    ) -> Result<AggregateProfileResponse> {
        if requests.is_empty() {
            return Err(MuninnError::Validation(
                "at least one track is required".into(),
            ));
        }
        let profiles = self.emotional_profiles_batch(requests).await?;
        let distributions: Vec<EmotionDistribution> =
            profiles.iter().map(|p| p.emotional_profile).collect();
        let emotional_profile = EmotionDistribution::average(&distributions).ok_or_else(|| {
            MuninnError::Validation("no track profile could be resolved".into())
        })?;
        Ok(AggregateProfileResponse {
            track_ids: profiles.into_iter().map(|p| p.track_id).collect(),
            emotional_profile,
        })
    }
}

/// Interpret a profile payload.
pub fn decode_profile(payload: &Payload) -> Result<EmotionDistribution> {
    match payload {
        Payload::Structured(value) => EmotionDistribution::from_value(value.clone()),
        other => Err(MuninnError::Validation(format!(
            "expected a structured profile, got {}",
            other.kind()
        ))),
    }
}

/// Interpret a tagged-lyrics payload.
pub fn decode_tags(payload: &Payload) -> Result<String> {
    match payload {
        Payload::Text(text) => Ok(text.clone()),
        other => Err(MuninnError::Validation(format!(
            "expected tagged lyrics text, got {}",
            other.kind()
        ))),
    }
}

/// Build responses for validated items, logging every dropped item.
///
/// Validation failures count against the same threshold as resolution
/// failures.
fn collect_validated<Req, T, Resp>(
    total: usize,
    report: &BatchReport,
    outcomes: impl Iterator<Item = (Option<Req>, Result<T>)>,
    build: impl Fn(Req, T) -> Resp,
) -> Result<Vec<Resp>> {
    for failure in &report.failures {
        warn!(key = %failure.key, error = %failure.error, "batch item failed");
    }

    let mut responses = Vec::with_capacity(report.succeeded());
    let mut invalid = 0;
    for (request, outcome) in outcomes {
        match (request, outcome) {
            (Some(request), Ok(value)) => responses.push(build(request, value)),
            (_, Err(e)) => {
                warn!(error = %e, "batch item failed validation");
                invalid += 1;
            }
            (None, Ok(_)) => invalid += 1,
        }
    }

    if !meets_threshold(responses.len(), total) {
        return Err(MuninnError::BatchBelowThreshold {
            succeeded: responses.len(),
            failed: report.failed() + invalid,
        });
    }
    Ok(responses)
}
