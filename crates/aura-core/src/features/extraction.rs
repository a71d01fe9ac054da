//! Feature computation from a mono waveform

use super::{FeatureBundle, FeatureVector};
use crate::beat::BeatDetector;
use crate::config::{AnalysisConfig, BpmConfig};
use crate::dsp::mfcc::{coefficient_means, mfcc_from_db, N_MFCC};
use crate::dsp::onset::OnsetDetector;
use crate::dsp::spectral::{
    chroma, chroma_mean, mean, rms, spectral_bandwidth, spectral_centroid, spectral_rolloff,
    zero_crossing_rate,
};
use crate::dsp::stft::{FrameConfig, Spectrogram};
use crate::dsp::SpectralAnalysis;
use crate::error::FeatureExtractionError;

/// Stateless feature extractor
///
/// Holds only the frame geometry and tempo settings; every call is a pure
/// function of its input.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    frames: FrameConfig,
    beat: BeatDetector,
}

impl FeatureExtractor {
    pub fn new(frames: FrameConfig, bpm: BpmConfig) -> Self {
        Self {
            frames,
            beat: BeatDetector::new(bpm, frames),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            FrameConfig::new(config.frame_size, config.hop_size),
            config.bpm.clone(),
        )
    }

    pub fn frames(&self) -> &FrameConfig {
        &self.frames
    }

    /// Spectrogram, mel spectrogram and onset envelope with this geometry
    pub fn analyze(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<SpectralAnalysis, FeatureExtractionError> {
        SpectralAnalysis::compute(samples, sample_rate, &self.frames)
    }

    /// Compute the 19-value classifier input, or the reason it failed
    pub fn try_feature_vector(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<FeatureVector, FeatureExtractionError> {
        let analysis = self.analyze(samples, sample_rate)?;
        self.try_feature_vector_from(&analysis, samples)
    }

    /// Classifier input from an already computed analysis of `samples`
    pub fn try_feature_vector_from(
        &self,
        analysis: &SpectralAnalysis,
        samples: &[f32],
    ) -> Result<FeatureVector, FeatureExtractionError> {
        let spec = &analysis.spectrogram;
        let mfcc = coefficient_means(&mfcc_from_db(&analysis.mel_db, N_MFCC));
        let tempo = self
            .beat
            .tempo_from_envelope(&analysis.onset_envelope, analysis.sample_rate());

        let mut values = Vec::with_capacity(mfcc.len() + 6);
        values.extend_from_slice(&mfcc);
        values.push(mean(&spectral_centroid(spec)));
        values.push(mean(&spectral_bandwidth(spec)));
        values.push(mean(&spectral_rolloff(spec)));
        values.push(tempo);
        values.push(mean(&zero_crossing_rate(samples, &analysis.frames)));
        values.push(mean(&rms(samples, &analysis.frames)));

        let vector = FeatureVector::from_values(&values);
        match vector.first_non_finite() {
            Some(name) => Err(FeatureExtractionError::NonFinite(name)),
            None => Ok(vector),
        }
    }

    /// Compute the classifier input, all zeros if extraction fails
    pub fn feature_vector(&self, samples: &[f32], sample_rate: u32) -> FeatureVector {
        self.try_feature_vector(samples, sample_rate)
            .unwrap_or_else(|e| {
                log::warn!("Feature extraction failed, using zero vector: {}", e);
                FeatureVector::zeros()
            })
    }

    /// Compute the visualization time series
    pub fn bundle(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<FeatureBundle, FeatureExtractionError> {
        let analysis = self.analyze(samples, sample_rate)?;
        Ok(self.bundle_from(&analysis, samples))
    }

    /// Visualization time series from an already computed analysis of `samples`
    pub fn bundle_from(&self, analysis: &SpectralAnalysis, samples: &[f32]) -> FeatureBundle {
        let sample_rate = analysis.sample_rate();
        let onset_times = OnsetDetector::new(&analysis.frames, sample_rate).detect_times(
            &analysis.onset_envelope,
            &analysis.frames,
            sample_rate,
        );

        FeatureBundle {
            spectral_centroids: spectral_centroid(&analysis.spectrogram),
            rms_energy: rms(samples, &analysis.frames),
            onset_times,
            chroma_mean: chroma_mean(&chroma(&analysis.spectrogram)),
        }
    }

    /// Spectral centroid per frame, without the rest of the bundle
    pub fn spectral_centroid_series(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Vec<f32>, FeatureExtractionError> {
        let spec = Spectrogram::compute(samples, sample_rate, &self.frames)?;
        Ok(spectral_centroid(&spec))
    }
}
