//! Aura Core - Audio analysis and mood inference for the aura visualizer
//!
//! Turns a mono waveform into the descriptors a visualizer needs:
//!
//! 1. **Beats** (`beat`): tempo estimate and beat timestamps
//! 2. **Features** (`features`): the fixed 19-value [`FeatureVector`] used by
//!    the classifier, plus a [`FeatureBundle`] of time series for drawing
//! 3. **Waveform** (`waveform`): bounded-length amplitude overview
//! 4. **Mood** (`mood`): small feed-forward network over the feature vector
//!
//! [`Analyzer`] composes all of them for whole files and live chunks.

pub mod analysis;
pub mod audio_file;
pub mod beat;
pub mod config;
pub mod dsp;
pub mod error;
pub mod features;
pub mod mood;
pub mod types;
pub mod waveform;

pub use analysis::{AnalysisResult, Analyzer, ChunkAnalysis};
pub use beat::{BeatDetector, BeatInfo};
pub use error::{
    AnalysisError, BeatDetectionError, DecodeError, FeatureExtractionError, InferenceError,
    ModelError,
};
pub use features::{FeatureBundle, FeatureExtractor, FeatureVector};
pub use mood::{Mood, MoodEngine, MoodPrediction};
pub use types::*;
