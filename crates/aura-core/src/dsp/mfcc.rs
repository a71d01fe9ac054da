//! Mel spectrogram and Mel-Frequency Cepstral Coefficients
//!
//! 128 triangular mel bands from 0 Hz to Nyquist (HTK mel scale), each band
//! area-normalized, log-compressed to dB with an 80 dB floor below the
//! loudest cell, then an orthonormal DCT-II keeps the first coefficients.

use super::stft::Spectrogram;

/// Number of mel bands
pub const N_MELS: usize = 128;

/// Number of cepstral coefficients kept
pub const N_MFCC: usize = 13;

/// Dynamic range kept by the dB conversion
const TOP_DB: f32 = 80.0;

/// Power floor before taking the log
const AMIN: f32 = 1e-10;

/// Sparse triangular mel filterbank
///
/// Each filter stores the first bin it touches and its weights from there,
/// so applying the bank costs roughly two multiplies per spectral bin.
pub struct MelFilterbank {
    filters: Vec<(usize, Vec<f32>)>,
}

impl MelFilterbank {
    /// Build `n_mels` filters for an `frame_size`-point FFT at `sample_rate`
    pub fn new(n_mels: usize, frame_size: usize, sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        let n_bins = frame_size / 2 + 1;
        let f_max = sample_rate / 2.0;

        let mel_min = hz_to_mel(0.0);
        let mel_max = hz_to_mel(f_max);

        // n_mels + 2 evenly spaced mel points → Hz
        let n_points = n_mels + 2;
        let hz_points: Vec<f32> = (0..n_points)
            .map(|i| mel_min + (mel_max - mel_min) * i as f32 / (n_points - 1) as f32)
            .map(mel_to_hz)
            .collect();

        let bin_hz = sample_rate / frame_size as f32;

        let filters = (0..n_mels)
            .map(|band| {
                let left = hz_points[band];
                let center = hz_points[band + 1];
                let right = hz_points[band + 2];
                // Area normalization: every filter integrates to the same energy
                let enorm = 2.0 / (right - left).max(f32::EPSILON);

                let first = ((left / bin_hz).floor() as usize).min(n_bins - 1);
                let last = ((right / bin_hz).ceil() as usize).min(n_bins - 1);

                let weights = (first..=last)
                    .map(|bin| {
                        let freq = bin as f32 * bin_hz;
                        let rising = if center > left {
                            (freq - left) / (center - left)
                        } else {
                            0.0
                        };
                        let falling = if right > center {
                            (right - freq) / (right - center)
                        } else {
                            0.0
                        };
                        rising.min(falling).max(0.0) * enorm
                    })
                    .collect();

                (first, weights)
            })
            .collect();

        Self { filters }
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    /// Apply the bank to one power spectrum frame
    pub fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|(first, weights)| {
                weights
                    .iter()
                    .zip(power.iter().skip(*first))
                    .map(|(w, p)| w * p)
                    .sum()
            })
            .collect()
    }
}

/// Mel power spectrogram (frames × bands)
pub fn mel_spectrogram(spec: &Spectrogram, bank: &MelFilterbank) -> Vec<Vec<f32>> {
    spec.power.iter().map(|frame| bank.apply(frame)).collect()
}

/// Convert a power matrix to dB, flooring at `TOP_DB` below its maximum
pub fn power_to_db(power: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let mut db: Vec<Vec<f32>> = power
        .iter()
        .map(|frame| frame.iter().map(|&p| 10.0 * p.max(AMIN).log10()).collect())
        .collect();

    let peak = db
        .iter()
        .flat_map(|frame| frame.iter())
        .cloned()
        .fold(f32::NEG_INFINITY, f32::max);
    let floor = peak - TOP_DB;

    for frame in &mut db {
        for v in frame.iter_mut() {
            *v = v.max(floor);
        }
    }
    db
}

/// Orthonormal DCT-II of each frame, keeping `n_coeffs` coefficients
pub fn mfcc_from_db(mel_db: &[Vec<f32>], n_coeffs: usize) -> Vec<Vec<f32>> {
    let Some(n) = mel_db.first().map(|f| f.len()) else {
        return Vec::new();
    };
    if n == 0 {
        return Vec::new();
    }

    let basis: Vec<Vec<f32>> = (0..n_coeffs)
        .map(|k| {
            let scale = if k == 0 {
                (1.0 / n as f32).sqrt()
            } else {
                (2.0 / n as f32).sqrt()
            };
            (0..n)
                .map(|i| {
                    scale
                        * (std::f32::consts::PI * k as f32 * (2.0 * i as f32 + 1.0)
                            / (2.0 * n as f32))
                            .cos()
                })
                .collect()
        })
        .collect();

    mel_db
        .iter()
        .map(|frame| {
            basis
                .iter()
                .map(|row| row.iter().zip(frame.iter()).map(|(b, x)| b * x).sum())
                .collect()
        })
        .collect()
}

/// Per-coefficient mean over time of an MFCC matrix (frames × coeffs)
pub fn coefficient_means(mfcc: &[Vec<f32>]) -> Vec<f32> {
    let Some(width) = mfcc.first().map(|f| f.len()) else {
        return Vec::new();
    };
    let mut means = vec![0.0f32; width];
    for frame in mfcc {
        for (m, v) in means.iter_mut().zip(frame.iter()) {
            *m += v;
        }
    }
    for m in &mut means {
        *m /= mfcc.len() as f32;
    }
    means
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}
