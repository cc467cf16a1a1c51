//! Request and response shapes exchanged with the HTTP layer.

use serde::{Deserialize, Serialize};

use super::{AnalysisKey, Emotion, EmotionDistribution};

/// Request for a track's emotion profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRequest {
    pub track_id: String,
    pub lyrics: String,
}

impl ProfileRequest {
    pub fn new(track_id: impl Into<String>, lyrics: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            lyrics: lyrics.into(),
        }
    }

    pub fn key(&self) -> AnalysisKey {
        AnalysisKey::profile(&self.track_id)
    }

    /// Text appended to the profile prompt template.
    pub fn prompt_input(&self) -> String {
        self.lyrics.clone()
    }
}

/// Request to mark up the passages of a track expressing one emotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagsRequest {
    pub track_id: String,
    pub lyrics: String,
    pub emotion: Emotion,
}

impl TagsRequest {
    pub fn new(track_id: impl Into<String>, lyrics: impl Into<String>, emotion: Emotion) -> Self {
        Self {
            track_id: track_id.into(),
            lyrics: lyrics.into(),
            emotion,
        }
    }

    pub fn key(&self) -> AnalysisKey {
        AnalysisKey::tags(&self.track_id, self.emotion)
    }

    /// Text appended to the tagging prompt template.
    pub fn prompt_input(&self) -> String {
        format!("\nEmotion to Tag: {}\nLyrics: {}", self.emotion, self.lyrics)
    }
}

/// A track's emotion profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub track_id: String,
    pub lyrics: String,
    pub emotional_profile: EmotionDistribution,
}

/// Tagged lyrics for one emotion. `lyrics` holds the marked-up text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagsResponse {
    pub track_id: String,
    pub lyrics: String,
    pub emotion: Emotion,
}

/// Mean emotion profile over a set of tracks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateProfileResponse {
    /// Tracks that contributed to the mean.
    pub track_ids: Vec<String>,
    pub emotional_profile: EmotionDistribution,
}
