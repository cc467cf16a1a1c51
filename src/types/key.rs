//! Cache keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Emotion;

/// Kind of analysis requested from the model.
///
/// Selects the prompt template, the expected response shape, and the
/// storage table. Always passed explicitly, never inferred from request
/// metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Full emotion distribution for a track.
    Profile,
    /// Lyrics with the passages expressing one emotion marked up.
    Tags,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Profile => "profile",
            Operation::Tags => "tags",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite identifier of one cached analysis: `(track_id, operation, discriminator)`.
///
/// The discriminator is empty for [`Operation::Profile`] and the emotion
/// label for [`Operation::Tags`]. The lyric text is deliberately not part
/// of the key, so two requests for the same track and emotion share an
/// entry even if their lyrics differ.
///
/// Fields are kept structured (no delimiter-joined strings) so identifiers
/// containing separators cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalysisKey {
    track_id: String,
    operation: Operation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    emotion: Option<Emotion>,
}

impl AnalysisKey {
    /// Key for a track's emotion profile.
    pub fn profile(track_id: impl Into<String>) -> Self {
        Self {
            track_id: track_id.into(),
            operation: Operation::Profile,
            emotion: None,
        }
    }

    /// Key for a track's tagging result for one emotion.
    pub fn tags(track_id: impl Into<String>, emotion: Emotion) -> Self {
        Self {
            track_id: track_id.into(),
            operation: Operation::Tags,
            emotion: Some(emotion),
        }
    }

    pub fn track_id(&self) -> &str {
        &self.track_id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// The tagged emotion; `None` for profile keys.
    pub fn emotion(&self) -> Option<Emotion> {
        self.emotion
    }

    /// The discriminator component: empty for profiles, the emotion label for tags.
    pub fn discriminator(&self) -> &'static str {
        self.emotion.map(|e| e.as_str()).unwrap_or("")
    }
}

impl fmt::Display for AnalysisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.emotion {
            Some(emotion) => write!(f, "{}[{:?}, {}]", self.operation, self.track_id, emotion),
            None => write!(f, "{}[{:?}]", self.operation, self.track_id),
        }
    }
}
