//! Tempo estimation and beat tracking
//!
//! Tempo comes from the autocorrelation of the onset strength envelope,
//! weighted by a log-normal prior around `start_bpm`. Beats are then placed by
//! dynamic programming: every frame picks the best predecessor roughly one
//! beat period earlier, trading onset strength against deviation from the
//! period, and the best chain is read back from the end.

use serde::{Deserialize, Serialize};

use crate::config::BpmConfig;
use crate::dsp::stft::FrameConfig;
use crate::dsp::SpectralAnalysis;
use crate::error::BeatDetectionError;

/// Envelope energy below which the input counts as silent
const SILENT_ENVELOPE: f32 = 1e-6;

/// Width of the tempo prior in octaves
const PRIOR_OCTAVES: f32 = 1.0;

/// Tempo and beat positions of a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatInfo {
    /// Estimated tempo in BPM (0 when nothing periodic was found)
    pub tempo: f32,
    /// Beat timestamps in seconds, strictly ascending
    pub beat_times: Vec<f32>,
    /// Number of beats
    pub beat_count: usize,
}

impl BeatInfo {
    pub fn new(tempo: f32, beat_times: Vec<f32>) -> Self {
        let beat_count = beat_times.len();
        Self {
            tempo,
            beat_times,
            beat_count,
        }
    }

    /// No tempo, no beats (silence / ambient input)
    pub fn none() -> Self {
        Self::new(0.0, Vec::new())
    }
}

/// Tempo and beat detector
#[derive(Debug, Clone)]
pub struct BeatDetector {
    bpm: BpmConfig,
    frames: FrameConfig,
}

impl Default for BeatDetector {
    fn default() -> Self {
        Self::new(BpmConfig::default(), FrameConfig::default())
    }
}

impl BeatDetector {
    pub fn new(bpm: BpmConfig, frames: FrameConfig) -> Self {
        Self { bpm, frames }
    }

    pub fn frames(&self) -> &FrameConfig {
        &self.frames
    }

    /// Detect tempo and beats in a mono signal
    pub fn detect(&self, samples: &[f32], sample_rate: u32) -> Result<BeatInfo, BeatDetectionError> {
        let envelope = self.onset_envelope(samples, sample_rate)?;
        Ok(self.detect_from_envelope(&envelope, sample_rate))
    }

    /// Onset strength envelope used for beat tracking
    pub fn onset_envelope(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<Vec<f32>, BeatDetectionError> {
        if samples.is_empty() {
            return Err(BeatDetectionError::EmptyInput);
        }
        if sample_rate == 0 {
            return Err(BeatDetectionError::InvalidSampleRate(sample_rate));
        }

        SpectralAnalysis::compute(samples, sample_rate, &self.frames)
            .map(|analysis| analysis.onset_envelope)
            .map_err(|e| BeatDetectionError::Onset(e.to_string()))
    }

    /// Track beats on an already computed spectral analysis
    pub fn detect_from_analysis(&self, analysis: &SpectralAnalysis) -> BeatInfo {
        self.detect_from_envelope(&analysis.onset_envelope, analysis.sample_rate())
    }

    /// Track beats on a precomputed onset envelope
    pub fn detect_from_envelope(&self, envelope: &[f32], sample_rate: u32) -> BeatInfo {
        let tempo = self.tempo_from_envelope(envelope, sample_rate);
        if tempo <= 0.0 {
            return BeatInfo::none();
        }

        let frame_rate = sample_rate as f32 / self.frames.hop_size as f32;
        let period = 60.0 * frame_rate / tempo;
        let beats = self.track_beats(envelope, period);

        log::debug!(
            "Beat tracking: {:.2} BPM, {} beats over {} frames",
            tempo,
            beats.len(),
            envelope.len()
        );

        let beat_times = beats
            .into_iter()
            .map(|frame| self.frames.frame_time(frame, sample_rate))
            .collect();
        BeatInfo::new(tempo, beat_times)
    }

    /// Tempo of a precomputed onset envelope, 0 for silence
    pub fn tempo_from_envelope(&self, envelope: &[f32], sample_rate: u32) -> f32 {
        if envelope.iter().all(|&v| v.abs() < SILENT_ENVELOPE) {
            return 0.0;
        }
        self.estimate_tempo(envelope, sample_rate).unwrap_or(0.0)
    }

    /// Estimate tempo in BPM from an onset envelope
    ///
    /// Returns `None` when the envelope is flat or too short to contain a
    /// single lag in the configured tempo range.
    pub fn estimate_tempo(&self, envelope: &[f32], sample_rate: u32) -> Option<f32> {
        let n = envelope.len();
        if n < 3 || sample_rate == 0 {
            return None;
        }
        let frame_rate = sample_rate as f32 / self.frames.hop_size as f32;

        let min_lag = ((60.0 * frame_rate / self.bpm.max_tempo).floor() as usize).max(1);
        let max_lag = ((60.0 * frame_rate / self.bpm.min_tempo).ceil() as usize).min(n - 1);
        if min_lag >= max_lag {
            return None;
        }

        let mean = envelope.iter().sum::<f32>() / n as f32;
        let centered: Vec<f32> = envelope.iter().map(|&x| x - mean).collect();
        let energy: f32 = centered.iter().map(|&x| x * x).sum();
        if energy < 1e-10 {
            return None;
        }

        let autocorr = |lag: usize| -> f32 {
            centered[..n - lag]
                .iter()
                .zip(centered[lag..].iter())
                .map(|(&a, &b)| a * b)
                .sum::<f32>()
                / energy
        };
        let prior = |lag: f32| -> f32 {
            let bpm = 60.0 * frame_rate / lag;
            let octaves = (bpm / self.bpm.start_bpm).log2() / PRIOR_OCTAVES;
            (-0.5 * octaves * octaves).exp()
        };

        let scores: Vec<f32> = (min_lag..=max_lag)
            .map(|lag| autocorr(lag) * prior(lag as f32))
            .collect();

        let (best_idx, _) = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
        let best_lag = min_lag + best_idx;

        // Parabolic interpolation around the peak for sub-frame precision
        let lag = if best_idx > 0 && best_idx + 1 < scores.len() {
            let prev = scores[best_idx - 1];
            let curr = scores[best_idx];
            let next = scores[best_idx + 1];
            let denom = prev - 2.0 * curr + next;
            if denom.abs() > 1e-10 {
                let offset = (0.5 * (prev - next) / denom).clamp(-0.5, 0.5);
                best_lag as f32 + offset
            } else {
                best_lag as f32
            }
        } else {
            best_lag as f32
        };

        if lag <= 0.0 {
            return None;
        }
        Some((60.0 * frame_rate / lag).clamp(self.bpm.min_tempo, self.bpm.max_tempo))
    }

    /// Dynamic programming beat tracker
    ///
    /// `period` is the beat period in frames. Returns ascending frame indices.
    pub fn track_beats(&self, envelope: &[f32], period: f32) -> Vec<usize> {
        let n = envelope.len();
        if n == 0 || !period.is_finite() || period < 1.0 {
            return Vec::new();
        }

        let local = local_score(envelope, period);
        let max_local = local.iter().cloned().fold(0.0f32, f32::max);
        if max_local <= 0.0 {
            return Vec::new();
        }

        let min_gap = ((period / 2.0).round() as usize).max(1);
        let max_gap = ((2.0 * period).round() as usize).max(min_gap);
        let tightness = self.bpm.tightness;

        let mut cumulative = vec![0.0f32; n];
        let mut backlink: Vec<Option<usize>> = vec![None; n];
        let mut first_beat = true;

        for i in 0..n {
            let mut best: Option<(f32, Option<usize>)> = None;
            for gap in min_gap..=max_gap {
                let penalty = -tightness * (gap as f32 / period).ln().powi(2);
                let (candidate, link) = if gap <= i {
                    (cumulative[i - gap] + penalty, Some(i - gap))
                } else {
                    (penalty, None)
                };
                if best.map_or(true, |(score, _)| candidate > score) {
                    best = Some((candidate, link));
                }
            }

            let (best_score, link) = best.unwrap_or((0.0, None));
            cumulative[i] = local[i] + best_score;

            // A chain cannot start on a frame with no onset energy
            if first_beat && local[i] < 0.01 * max_local {
                backlink[i] = None;
            } else {
                backlink[i] = link;
                first_beat = false;
            }
        }

        let Some(last) = last_beat(&cumulative) else {
            return Vec::new();
        };

        let mut beats = vec![last];
        let mut cursor = last;
        while let Some(prev) = backlink[cursor] {
            beats.push(prev);
            cursor = prev;
        }
        beats.reverse();

        trim_weak_beats(&beats, &local)
    }
}

/// Envelope normalized by its standard deviation and smoothed by a
/// Gaussian of width `period / 32`
fn local_score(envelope: &[f32], period: f32) -> Vec<f32> {
    let n = envelope.len();
    let mean = envelope.iter().sum::<f32>() / n as f32;
    let std = if n > 1 {
        (envelope.iter().map(|&x| (x - mean).powi(2)).sum::<f32>() / (n - 1) as f32).sqrt()
    } else {
        0.0
    };
    let scale = if std > 1e-10 { std } else { 1.0 };

    let half = period.round().max(1.0) as isize;
    let kernel: Vec<f32> = (-half..=half)
        .map(|k| (-0.5 * (k as f32 * 32.0 / period).powi(2)).exp())
        .collect();

    (0..n as isize)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(j, &w)| {
                    let idx = i + j as isize - half;
                    (idx >= 0 && (idx as usize) < n).then(|| w * envelope[idx as usize] / scale)
                })
                .sum()
        })
        .collect()
}

/// Last frame that is a local maximum of the cumulative score and reaches
/// half the median of all such maxima
fn last_beat(cumulative: &[f32]) -> Option<usize> {
    let n = cumulative.len();
    let maxima: Vec<usize> = (0..n)
        .filter(|&i| {
            let left = if i > 0 { cumulative[i - 1] } else { f32::NEG_INFINITY };
            let right = if i + 1 < n { cumulative[i + 1] } else { f32::NEG_INFINITY };
            cumulative[i] >= left && cumulative[i] >= right
        })
        .collect();
    if maxima.is_empty() {
        return None;
    }

    let mut values: Vec<f32> = maxima.iter().map(|&i| cumulative[i]).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = values[values.len() / 2];

    maxima
        .iter()
        .rev()
        .find(|&&i| cumulative[i] >= 0.5 * median)
        .copied()
        .or_else(|| maxima.last().copied())
}

/// Drop leading and trailing beats weaker than half the RMS beat strength
fn trim_weak_beats(beats: &[usize], local: &[f32]) -> Vec<usize> {
    if beats.is_empty() {
        return Vec::new();
    }
    let strengths: Vec<f32> = beats.iter().map(|&b| local[b]).collect();
    let rms = (strengths.iter().map(|s| s * s).sum::<f32>() / strengths.len() as f32).sqrt();
    let threshold = 0.5 * rms;

    let start = strengths.iter().position(|&s| s >= threshold);
    let end = strengths.iter().rposition(|&s| s >= threshold);
    match (start, end) {
        (Some(s), Some(e)) if s <= e => beats[s..=e].to_vec(),
        _ => Vec::new(),
    }
}
