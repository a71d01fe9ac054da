//! Short-time signal analysis shared by feature extraction and beat tracking
//!
//! # Frame geometry
//!
//! Frames are centered: the signal is zero-padded by `frame_size / 2` on both
//! sides, frame `i` is centered on sample `i * hop_size` and there are
//! `1 + len / hop_size` frames for a non-empty signal. With the defaults
//! (2048 / 512 at 44.1 kHz) one frame step is ~11.6 ms.

pub mod mfcc;
pub mod onset;
pub mod spectral;
pub mod stft;

pub use mfcc::MelFilterbank;
pub use onset::OnsetDetector;
pub use stft::{FrameConfig, Spectrogram};

use crate::error::FeatureExtractionError;
use mfcc::{mel_spectrogram, power_to_db, N_MELS};
use onset::onset_strength;

/// Spectrogram, dB mel spectrogram and onset envelope of one signal
///
/// Whole-track analysis computes this once and hands it to beat tracking,
/// the feature bundle and mood inference.
#[derive(Debug, Clone)]
pub struct SpectralAnalysis {
    pub frames: FrameConfig,
    pub spectrogram: Spectrogram,
    pub mel_db: Vec<Vec<f32>>,
    pub onset_envelope: Vec<f32>,
}

impl SpectralAnalysis {
    pub fn compute(
        samples: &[f32],
        sample_rate: u32,
        frames: &FrameConfig,
    ) -> Result<Self, FeatureExtractionError> {
        let spectrogram = Spectrogram::compute(samples, sample_rate, frames)?;
        let bank = MelFilterbank::new(N_MELS, frames.frame_size, sample_rate);
        let mel_db = power_to_db(&mel_spectrogram(&spectrogram, &bank));
        let onset_envelope = onset_strength(&mel_db);
        Ok(Self {
            frames: *frames,
            spectrogram,
            mel_db,
            onset_envelope,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.spectrogram.sample_rate
    }

    pub fn n_frames(&self) -> usize {
        self.spectrogram.n_frames()
    }
}
