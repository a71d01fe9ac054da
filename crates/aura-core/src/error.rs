//! Error types for each analysis stage
//!
//! Decode failures abort a request, extraction and inference failures are
//! recovered where they happen (zero vector, fallback prediction), and
//! [`AnalysisError`] is what the orchestrator hands back to its caller.

use std::path::PathBuf;
use thiserror::Error;

/// Audio file could not be turned into a waveform
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to open audio file: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported audio format: {0}")]
    Unsupported(String),

    #[error("No audio track found")]
    NoAudioTrack,

    #[error("Audio file contains no samples")]
    Empty,

    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Signal too short or degenerate for a transform
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureExtractionError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("FFT failed: {0}")]
    Fft(String),

    #[error("Non-finite value in feature '{0}'")]
    NonFinite(&'static str),

    #[error("Tempo estimation failed: {0}")]
    Tempo(#[from] BeatDetectionError),
}

/// Tempo/beat estimation could not run
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BeatDetectionError {
    #[error("Cannot detect beats in an empty waveform")]
    EmptyInput,

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Onset analysis failed: {0}")]
    Onset(String),
}

/// Failure somewhere in the feature → scaler → network path
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Feature extraction failed: {0}")]
    Features(#[from] FeatureExtractionError),

    #[error("Shape mismatch: expected {expected} values, got {found}")]
    Shape { expected: usize, found: usize },

    #[error("Numeric error: {0}")]
    Numeric(String),

    #[error("Model lock poisoned")]
    Poisoned,
}

/// Checkpoint could not be read, written or validated
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read checkpoint: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write checkpoint: {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid checkpoint format: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Checkpoint mismatch: {0}")]
    Mismatch(String),

    #[error("Model lock poisoned")]
    Poisoned,
}

/// Errors surfaced by the analysis orchestrator
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Failed to load audio file")]
    Decode(#[source] DecodeError),

    #[error("Beat detection failed: {0}")]
    BeatDetection(#[from] BeatDetectionError),

    #[error("Feature extraction failed: {0}")]
    Features(#[from] FeatureExtractionError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<DecodeError> for AnalysisError {
    fn from(err: DecodeError) -> Self {
        AnalysisError::Decode(err)
    }
}
