//! Mood classification
//!
//! A small feed-forward network maps a standardized [`FeatureVector`] to a
//! probability distribution over the five moods of [`Mood::ALL`]. The
//! position of a mood in that list is its network output index, so it is
//! part of the checkpoint format and must not be reordered.
//!
//! [`FeatureVector`]: crate::features::FeatureVector

mod engine;
mod network;
mod scaler;

pub use engine::{
    Checkpoint, LayerCheckpoint, ModelState, MoodEngine, MoodModel, CHECKPOINT_VERSION,
};
pub use network::{DenseLayer, MoodNetwork, HIDDEN_1, HIDDEN_2};
pub use scaler::StandardScaler;

use std::collections::HashMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of mood classes
pub const MOOD_COUNT: usize = 5;

/// Label reported when no mood could be predicted
pub const UNKNOWN_LABEL: &str = "unknown";

/// RGB colour, each channel in [0, 1]
pub type Rgb = (f32, f32, f32);

/// Display colour for labels outside the vocabulary
pub const DEFAULT_COLOR: Rgb = (1.0, 1.0, 1.0);

/// Mood vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Sad,
    Energetic,
    Calm,
    Angry,
}

impl Mood {
    /// Every mood, in network output order
    pub const ALL: [Mood; MOOD_COUNT] = [
        Mood::Happy,
        Mood::Sad,
        Mood::Energetic,
        Mood::Calm,
        Mood::Angry,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Energetic => "energetic",
            Mood::Calm => "calm",
            Mood::Angry => "angry",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.label() == label)
    }

    /// Network output index
    pub fn index(self) -> usize {
        self as usize
    }

    /// Representative display colour
    pub fn color(self) -> Rgb {
        match self {
            Mood::Happy => (1.0, 0.7, 0.0),
            Mood::Sad => (0.2, 0.3, 0.8),
            Mood::Energetic => (1.0, 0.0, 0.3),
            Mood::Calm => (0.3, 0.8, 0.5),
            Mood::Angry => (0.9, 0.1, 0.1),
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Display colour for any label, white when it is not a known mood
pub fn mood_color(label: &str) -> Rgb {
    Mood::from_label(label)
        .map(Mood::color)
        .unwrap_or(DEFAULT_COLOR)
}

/// Probability of each mood, indexed in [`Mood::ALL`] order
///
/// Serialized as a `{label: probability}` map.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "HashMap<String, f32>")]
pub struct MoodProbabilities([f32; MOOD_COUNT]);

impl MoodProbabilities {
    pub fn new(values: [f32; MOOD_COUNT]) -> Self {
        Self(values)
    }

    /// Same probability for every mood
    pub fn uniform() -> Self {
        Self([1.0 / MOOD_COUNT as f32; MOOD_COUNT])
    }

    pub fn get(&self, mood: Mood) -> f32 {
        self.0[mood.index()]
    }

    pub fn values(&self) -> &[f32; MOOD_COUNT] {
        &self.0
    }

    /// `(mood, probability)` pairs in vocabulary order
    pub fn iter(&self) -> impl Iterator<Item = (Mood, f32)> + '_ {
        Mood::ALL.into_iter().zip(self.0.iter().copied())
    }

    /// Most probable mood and its probability (first wins on ties)
    pub fn argmax(&self) -> (Mood, f32) {
        let mut best = (Mood::ALL[0], self.0[0]);
        for (mood, p) in self.iter().skip(1) {
            if p > best.1 {
                best = (mood, p);
            }
        }
        best
    }
}

impl Serialize for MoodProbabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(MOOD_COUNT))?;
        for (mood, p) in self.iter() {
            map.serialize_entry(mood.label(), &p)?;
        }
        map.end()
    }
}

impl TryFrom<HashMap<String, f32>> for MoodProbabilities {
    type Error = String;

    fn try_from(map: HashMap<String, f32>) -> Result<Self, Self::Error> {
        let mut values = [0.0f32; MOOD_COUNT];
        for mood in Mood::ALL {
            values[mood.index()] = *map
                .get(mood.label())
                .ok_or_else(|| format!("missing probability for '{}'", mood))?;
        }
        Ok(Self(values))
    }
}

/// Result of mood inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodPrediction {
    /// Most probable mood, `None` for the fallback ("unknown" on the wire)
    #[serde(serialize_with = "serialize_label", deserialize_with = "deserialize_label")]
    pub predicted_mood: Option<Mood>,
    /// Probability of the predicted mood
    pub confidence: f32,
    /// Full distribution over the vocabulary
    pub probabilities: MoodProbabilities,
}

impl MoodPrediction {
    /// Prediction from a probability distribution
    pub fn from_probabilities(probabilities: MoodProbabilities) -> Self {
        let (mood, confidence) = probabilities.argmax();
        Self {
            predicted_mood: Some(mood),
            confidence,
            probabilities,
        }
    }

    /// "unknown" with zero confidence and a uniform distribution
    pub fn fallback() -> Self {
        Self {
            predicted_mood: None,
            confidence: 0.0,
            probabilities: MoodProbabilities::uniform(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.predicted_mood.is_none()
    }

    /// Wire label of the predicted mood
    pub fn label(&self) -> &'static str {
        self.predicted_mood.map_or(UNKNOWN_LABEL, Mood::label)
    }
}

fn serialize_label<S: Serializer>(mood: &Option<Mood>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(mood.map_or(UNKNOWN_LABEL, Mood::label))
}

fn deserialize_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Mood>, D::Error> {
    let label = String::deserialize(deserializer)?;
    if label == UNKNOWN_LABEL {
        return Ok(None);
    }
    Mood::from_label(&label)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown mood label '{}'", label)))
}
