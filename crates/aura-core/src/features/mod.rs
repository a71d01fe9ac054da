//! Feature extraction for mood classification and visualization
//!
//! [`FeatureVector`] is the fixed 19-value input of the mood network, in this
//! order:
//!
//! | index | feature                 |
//! |-------|-------------------------|
//! | 0-12  | MFCC means, coeff 0..12 |
//! | 13    | spectral centroid mean  |
//! | 14    | spectral bandwidth mean |
//! | 15    | spectral rolloff mean   |
//! | 16    | tempo (BPM)             |
//! | 17    | zero-crossing rate mean |
//! | 18    | RMS energy mean         |
//!
//! Scaler statistics and network weights are stored in this order, so it
//! must never change.
//!
//! [`FeatureBundle`] holds the time series the visualizer draws. Its series
//! have one value per analysis frame (2048-sample frames, 512-sample hop,
//! centered), so their length grows with the input.

mod extraction;

pub use extraction::FeatureExtractor;

use serde::{Deserialize, Serialize};

use crate::dsp::mfcc::N_MFCC;
use crate::dsp::spectral::N_CHROMA;

/// Number of values in a [`FeatureVector`]
pub const FEATURE_COUNT: usize = 19;

/// Classifier input features, named
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Mean of each MFCC over time
    pub mfcc: [f32; N_MFCC],
    /// Mean spectral centroid in Hz (brightness)
    pub spectral_centroid: f32,
    /// Mean spectral bandwidth in Hz (spread)
    pub spectral_bandwidth: f32,
    /// Mean 85% rolloff frequency in Hz
    pub spectral_rolloff: f32,
    /// Tempo estimate in BPM
    pub tempo: f32,
    /// Mean zero-crossing rate
    pub zero_crossing_rate: f32,
    /// Mean RMS energy
    pub rms_energy: f32,
}

impl FeatureVector {
    /// Feature names in vector order
    pub const NAMES: [&'static str; FEATURE_COUNT] = [
        "mfcc_0",
        "mfcc_1",
        "mfcc_2",
        "mfcc_3",
        "mfcc_4",
        "mfcc_5",
        "mfcc_6",
        "mfcc_7",
        "mfcc_8",
        "mfcc_9",
        "mfcc_10",
        "mfcc_11",
        "mfcc_12",
        "spectral_centroid",
        "spectral_bandwidth",
        "spectral_rolloff",
        "tempo",
        "zero_crossing_rate",
        "rms_energy",
    ];

    /// All-zero vector (the extraction failure value)
    pub fn zeros() -> Self {
        Self::default()
    }

    /// Flatten in network input order
    pub fn to_array(&self) -> [f32; FEATURE_COUNT] {
        let mut out = [0.0f32; FEATURE_COUNT];
        out[..N_MFCC].copy_from_slice(&self.mfcc);
        out[13] = self.spectral_centroid;
        out[14] = self.spectral_bandwidth;
        out[15] = self.spectral_rolloff;
        out[16] = self.tempo;
        out[17] = self.zero_crossing_rate;
        out[18] = self.rms_energy;
        out
    }

    pub fn from_array(values: [f32; FEATURE_COUNT]) -> Self {
        let mut mfcc = [0.0f32; N_MFCC];
        mfcc.copy_from_slice(&values[..N_MFCC]);
        Self {
            mfcc,
            spectral_centroid: values[13],
            spectral_bandwidth: values[14],
            spectral_rolloff: values[15],
            tempo: values[16],
            zero_crossing_rate: values[17],
            rms_energy: values[18],
        }
    }

    /// Build from a flat slice of any length
    ///
    /// Short input is zero-padded at the end, long input keeps its first
    /// [`FEATURE_COUNT`] values. Both corrections are logged.
    pub fn from_values(values: &[f32]) -> Self {
        if values.len() != FEATURE_COUNT {
            log::warn!(
                "Feature vector has {} values, expected {}; {}",
                values.len(),
                FEATURE_COUNT,
                if values.len() < FEATURE_COUNT {
                    "zero-padding"
                } else {
                    "truncating"
                }
            );
        }
        let mut out = [0.0f32; FEATURE_COUNT];
        for (slot, &v) in out.iter_mut().zip(values.iter()) {
            *slot = v;
        }
        Self::from_array(out)
    }

    /// Name of the first non-finite feature, if any
    pub fn first_non_finite(&self) -> Option<&'static str> {
        self.to_array()
            .iter()
            .zip(Self::NAMES.iter())
            .find(|(v, _)| !v.is_finite())
            .map(|(_, name)| *name)
    }
}

/// Visualization features of one signal
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureBundle {
    /// Spectral centroid per frame in Hz
    pub spectral_centroids: Vec<f32>,
    /// RMS amplitude per frame
    pub rms_energy: Vec<f32>,
    /// Onset timestamps in seconds
    pub onset_times: Vec<f32>,
    /// Mean normalized energy per pitch class, C..B
    pub chroma_mean: [f32; N_CHROMA],
}
