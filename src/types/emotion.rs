//! Emotion labels and the 15-dimension emotion distribution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{MuninnError, Result};

/// Allowed deviation of a distribution's sum from 1.0.
pub const SUM_TOLERANCE: f64 = 1e-5;

/// The closed set of emotion labels an analysis can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Sadness,
    Anger,
    Fear,
    Love,
    Hope,
    Nostalgia,
    Loneliness,
    Confidence,
    Despair,
    Excitement,
    Mystery,
    Defiance,
    Gratitude,
    Spirituality,
}

impl Emotion {
    /// Every label, in canonical column order.
    pub const ALL: [Emotion; 15] = [
        Emotion::Joy,
        Emotion::Sadness,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Love,
        Emotion::Hope,
        Emotion::Nostalgia,
        Emotion::Loneliness,
        Emotion::Confidence,
        Emotion::Despair,
        Emotion::Excitement,
        Emotion::Mystery,
        Emotion::Defiance,
        Emotion::Gratitude,
        Emotion::Spirituality,
    ];

    /// Lowercase label, as used on the wire and as a storage column name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Joy => "joy",
            Emotion::Sadness => "sadness",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Love => "love",
            Emotion::Hope => "hope",
            Emotion::Nostalgia => "nostalgia",
            Emotion::Loneliness => "loneliness",
            Emotion::Confidence => "confidence",
            Emotion::Despair => "despair",
            Emotion::Excitement => "excitement",
            Emotion::Mystery => "mystery",
            Emotion::Defiance => "defiance",
            Emotion::Gratitude => "gratitude",
            Emotion::Spirituality => "spirituality",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = MuninnError;

    fn from_str(s: &str) -> Result<Self> {
        Emotion::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| MuninnError::Validation(format!("unknown emotion label '{s}'")))
    }
}

/// Share of each emotion in a piece of lyrics.
///
/// Every label must be present, each value must lie in `[0, 1]`, and the
/// values must sum to 1.0 within [`SUM_TOLERANCE`]. Deserialization only
/// enforces presence; call [`validate`](Self::validate) (or build through
/// [`from_value`](Self::from_value)) for the range and sum checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionDistribution {
    pub joy: f64,
    pub sadness: f64,
    pub anger: f64,
    pub fear: f64,
    pub love: f64,
    pub hope: f64,
    pub nostalgia: f64,
    pub loneliness: f64,
    pub confidence: f64,
    pub despair: f64,
    pub excitement: f64,
    pub mystery: f64,
    pub defiance: f64,
    pub gratitude: f64,
    pub spirituality: f64,
}

impl EmotionDistribution {
    /// Build a distribution from a per-label lookup.
    pub fn from_fn(mut f: impl FnMut(Emotion) -> f64) -> Self {
        Self {
            joy: f(Emotion::Joy),
            sadness: f(Emotion::Sadness),
            anger: f(Emotion::Anger),
            fear: f(Emotion::Fear),
            love: f(Emotion::Love),
            hope: f(Emotion::Hope),
            nostalgia: f(Emotion::Nostalgia),
            loneliness: f(Emotion::Loneliness),
            confidence: f(Emotion::Confidence),
            despair: f(Emotion::Despair),
            excitement: f(Emotion::Excitement),
            mystery: f(Emotion::Mystery),
            defiance: f(Emotion::Defiance),
            gratitude: f(Emotion::Gratitude),
            spirituality: f(Emotion::Spirituality),
        }
    }

    /// Parse and validate a distribution from a JSON object.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let distribution: Self = serde_json::from_value(value)
            .map_err(|e| MuninnError::Validation(format!("invalid emotion distribution: {e}")))?;
        distribution.validate()?;
        Ok(distribution)
    }

    /// Value for a single label.
    pub fn get(&self, emotion: Emotion) -> f64 {
        match emotion {
            Emotion::Joy => self.joy,
            Emotion::Sadness => self.sadness,
            Emotion::Anger => self.anger,
            Emotion::Fear => self.fear,
            Emotion::Love => self.love,
            Emotion::Hope => self.hope,
            Emotion::Nostalgia => self.nostalgia,
            Emotion::Loneliness => self.loneliness,
            Emotion::Confidence => self.confidence,
            Emotion::Despair => self.despair,
            Emotion::Excitement => self.excitement,
            Emotion::Mystery => self.mystery,
            Emotion::Defiance => self.defiance,
            Emotion::Gratitude => self.gratitude,
            Emotion::Spirituality => self.spirituality,
        }
    }

    /// `(label, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        Emotion::ALL.iter().map(move |e| (*e, self.get(*e)))
    }

    pub fn sum(&self) -> f64 {
        self.iter().map(|(_, v)| v).sum()
    }

    /// The label with the highest share. Ties go to the earlier label.
    pub fn dominant(&self) -> Emotion {
        self.iter()
            .fold((Emotion::Joy, f64::MIN), |best, (e, v)| {
                if v > best.1 { (e, v) } else { best }
            })
            .0
    }

    /// Check the range and sum invariants.
    pub fn validate(&self) -> Result<()> {
        for (emotion, value) in self.iter() {
            if !(0.0..=1.0).contains(&value) {
                return Err(MuninnError::Validation(format!(
                    "{emotion} = {value} is outside [0, 1]"
                )));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(MuninnError::Validation(format!(
                "emotion values sum to {sum}, expected 1.0"
            )));
        }
        Ok(())
    }

    /// Label-wise mean of several distributions.
    ///
    /// Returns `None` for an empty slice. The mean of valid distributions
    /// is itself valid.
    pub fn average(distributions: &[EmotionDistribution]) -> Option<Self> {
        if distributions.is_empty() {
            return None;
        }
        let n = distributions.len() as f64;
        Some(Self::from_fn(|e| {
            distributions.iter().map(|d| d.get(e)).sum::<f64>() / n
        }))
    }
}
