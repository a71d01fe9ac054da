//! Analysis orchestration
//!
//! [`Analyzer`] runs the full pipeline for a file (decode, beats, feature
//! bundle, waveform overview, mood) and a cheap reduced pipeline for short
//! in-memory chunks during playback.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::audio_file::load_audio;
use crate::beat::{BeatDetector, BeatInfo};
use crate::config::AnalysisConfig;
use crate::dsp::spectral::signal_rms;
use crate::dsp::stft::FrameConfig;
use crate::error::AnalysisError;
use crate::features::{FeatureBundle, FeatureExtractor};
use crate::mood::{MoodEngine, MoodPrediction};
use crate::types::Waveform;
use crate::waveform::downsample;

/// Full analysis of one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Length in seconds
    pub duration: f64,
    pub sample_rate: u32,
    pub beats: BeatInfo,
    pub features: FeatureBundle,
    /// Amplitude overview, at most `waveform_points` values
    pub waveform: Vec<f32>,
    pub mood: MoodPrediction,
}

/// Reduced analysis of a live chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkAnalysis {
    /// Amplitude overview, at most `chunk_waveform_points` values
    pub waveform: Vec<f32>,
    /// RMS of the whole chunk
    pub rms: f32,
    /// Spectral centroid of the first frame in Hz
    pub spectral_centroid: f32,
}

/// Composes beat detection, feature extraction, downsampling and mood
/// inference
pub struct Analyzer {
    config: AnalysisConfig,
    beat: BeatDetector,
    extractor: FeatureExtractor,
    mood: Arc<MoodEngine>,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig, mood: Arc<MoodEngine>) -> Self {
        let frames = FrameConfig::new(config.frame_size, config.hop_size);
        Self {
            beat: BeatDetector::new(config.bpm.clone(), frames),
            extractor: FeatureExtractor::new(frames, config.bpm.clone()),
            config,
            mood,
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn mood_engine(&self) -> &Arc<MoodEngine> {
        &self.mood
    }

    /// Decode and fully analyze an audio file
    pub fn analyze_file(&self, path: &Path) -> Result<AnalysisResult, AnalysisError> {
        let waveform = load_audio(path, self.config.sample_rate).map_err(|e| {
            log::warn!("analyze_file: {:?}: {}", path, e);
            AnalysisError::from(e)
        })?;
        self.analyze_waveform(&waveform)
    }

    /// Fully analyze an already decoded waveform
    pub fn analyze_waveform(&self, waveform: &Waveform) -> Result<AnalysisResult, AnalysisError> {
        if waveform.is_empty() {
            return Err(AnalysisError::InvalidInput("waveform is empty".to_string()));
        }
        let samples = &waveform.samples;
        let sample_rate = waveform.sample_rate;

        // One STFT and mel pass feeds every stage
        let spectral = self.extractor.analyze(samples, sample_rate)?;
        let beats = self.beat.detect_from_analysis(&spectral);
        let features = self.extractor.bundle_from(&spectral, samples);
        let overview = downsample(samples, self.config.waveform_points);
        let mood = self.mood.predict_analysis(&spectral, samples);

        log::info!(
            "Analysis complete: {:.2}s, {:.1} BPM, {} beats, mood {}",
            waveform.duration_secs(),
            beats.tempo,
            beats.beat_count,
            mood.label()
        );

        Ok(AnalysisResult {
            duration: waveform.duration_secs(),
            sample_rate,
            beats,
            features,
            waveform: overview,
            mood,
        })
    }

    /// Cheap analysis of a short buffer: RMS, first centroid and overview
    pub fn analyze_chunk(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<ChunkAnalysis, AnalysisError> {
        if samples.is_empty() {
            return Err(AnalysisError::InvalidInput("audio_data is empty".to_string()));
        }
        if sample_rate == 0 {
            return Err(AnalysisError::InvalidInput(
                "sample_rate must be positive".to_string(),
            ));
        }

        let centroids = self.extractor.spectral_centroid_series(samples, sample_rate)?;
        Ok(ChunkAnalysis {
            waveform: downsample(samples, self.config.chunk_waveform_points),
            rms: signal_rms(samples),
            spectral_centroid: centroids.first().copied().unwrap_or(0.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mood::MOOD_COUNT;

    fn analyzer() -> Analyzer {
        Analyzer::new(AnalysisConfig::default(), Arc::new(MoodEngine::with_seed(42)))
    }

    fn click_track(bpm: f32, secs: f32, sr: u32) -> Vec<f32> {
        let len = (secs * sr as f32) as usize;
        let interval = (60.0 / bpm * sr as f32) as usize;
        let mut samples = vec![0.0f32; len];
        for start in (0..len).step_by(interval) {
            for i in 0..800.min(len - start) {
                samples[start + i] =
                    (i as f32 * 0.7).sin() * 0.8 * (-(i as f32) / 150.0).exp();
            }
        }
        samples
    }

    fn write_wav(path: &Path, samples: &[f32], sr: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: sr,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_analyze_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clicks.wav");
        write_wav(&path, &click_track(120.0, 6.0, 44100), 44100);

        let result = analyzer().analyze_file(&path).unwrap();
        assert!((result.duration - 6.0).abs() < 0.01);
        assert_eq!(result.sample_rate, 44100);
        assert_eq!(result.waveform.len(), 1000);
        assert_eq!(result.beats.beat_count, result.beats.beat_times.len());
        assert!((result.beats.tempo - 120.0).abs() < 5.0, "tempo {}", result.beats.tempo);
        assert_eq!(result.features.rms_energy.len(), 1 + 6 * 44100 / 512);
        assert_eq!(result.mood.probabilities.values().len(), MOOD_COUNT);
    }

    #[test]
    fn test_analyze_file_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clicks.wav");
        write_wav(&path, &click_track(100.0, 4.0, 44100), 44100);

        let analyzer = analyzer();
        let a = analyzer.analyze_file(&path).unwrap();
        let b = analyzer.analyze_file(&path).unwrap();
        assert_eq!(a.beats, b.beats);
        assert_eq!(a.features, b.features);
        assert_eq!(a.mood, b.mood);
    }

    #[test]
    fn test_shared_analysis_matches_separate_stages() {
        let analyzer = analyzer();
        let samples = click_track(128.0, 3.0, 44100);
        let result = analyzer
            .analyze_waveform(&Waveform::new(samples.clone(), 44100))
            .unwrap();

        assert_eq!(result.beats, analyzer.beat.detect(&samples, 44100).unwrap());
        assert_eq!(
            result.features,
            analyzer.extractor.bundle(&samples, 44100).unwrap()
        );
        assert_eq!(result.mood, analyzer.mood.predict(&samples, 44100));
    }

    #[test]
    fn test_zero_sample_rate_is_error() {
        let err = analyzer()
            .analyze_waveform(&Waveform::new(vec![0.1; 1024], 0))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Features(_)));
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = analyzer()
            .analyze_file(Path::new("/nonexistent/track.mp3"))
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
        assert_eq!(err.to_string(), "Failed to load audio file");
    }

    #[test]
    fn test_resampled_file_reports_target_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("low.wav");
        write_wav(&path, &click_track(120.0, 2.0, 22050), 22050);

        let result = analyzer().analyze_file(&path).unwrap();
        assert_eq!(result.sample_rate, 44100);
        assert!((result.duration - 2.0).abs() < 0.01);
    }

    #[test]
    fn test_chunk_silence() {
        let chunk = analyzer().analyze_chunk(&vec![0.0; 44100 * 5], 44100).unwrap();
        assert_eq!(chunk.rms, 0.0);
        assert_eq!(chunk.spectral_centroid, 0.0);
        assert_eq!(chunk.waveform.len(), 100);
    }

    #[test]
    fn test_chunk_sine() {
        let samples: Vec<f32> = (0..4096)
            .map(|i| (2.0 * std::f32::consts::PI * 2000.0 * i as f32 / 44100.0).sin())
            .collect();
        let chunk = analyzer().analyze_chunk(&samples, 44100).unwrap();
        assert!((chunk.rms - std::f32::consts::FRAC_1_SQRT_2).abs() < 0.01);
        assert!(chunk.spectral_centroid > 1000.0, "{}", chunk.spectral_centroid);
        assert_eq!(chunk.waveform.len(), 100);
    }

    #[test]
    fn test_chunk_short_input_unchanged() {
        let chunk = analyzer().analyze_chunk(&[0.5, -0.5, 0.25], 44100).unwrap();
        assert_eq!(chunk.waveform, vec![0.5, -0.5, 0.25]);
    }

    #[test]
    fn test_chunk_rejects_empty() {
        let err = analyzer().analyze_chunk(&[], 44100).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: audio_data is empty");
    }

    #[test]
    fn test_result_json_field_names() {
        let chunk = ChunkAnalysis {
            waveform: vec![0.0],
            rms: 0.0,
            spectral_centroid: 0.0,
        };
        let json = serde_json::to_value(&chunk).unwrap();
        assert!(json.get("rms").is_some());
        assert!(json.get("spectral_centroid").is_some());
        assert!(json.get("waveform").is_some());
    }
}
