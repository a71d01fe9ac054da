//! Centered framing and power spectrogram

use realfft::RealFftPlanner;

use crate::error::FeatureExtractionError;
use crate::types::{FRAME_SIZE, HOP_SIZE};

/// Frame length and hop, in samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    pub frame_size: usize,
    pub hop_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            frame_size: FRAME_SIZE,
            hop_size: HOP_SIZE,
        }
    }
}

impl FrameConfig {
    pub fn new(frame_size: usize, hop_size: usize) -> Self {
        Self {
            frame_size: frame_size.max(2),
            hop_size: hop_size.max(1),
        }
    }

    /// Number of centered frames for a signal of `len` samples
    pub fn frame_count(&self, len: usize) -> usize {
        if len == 0 {
            0
        } else {
            1 + len / self.hop_size
        }
    }

    /// Time of frame `index` in seconds
    pub fn frame_time(&self, index: usize, sample_rate: u32) -> f32 {
        (index * self.hop_size) as f32 / sample_rate as f32
    }

    /// Number of frames in `seconds` (at least 1)
    pub fn frames_in(&self, seconds: f32, sample_rate: u32) -> usize {
        ((seconds * sample_rate as f32 / self.hop_size as f32) as usize).max(1)
    }

    /// Copy centered frame `index` into `out` (zero outside the signal)
    pub fn fill_frame(&self, samples: &[f32], index: usize, out: &mut [f32]) {
        let half = (self.frame_size / 2) as isize;
        let start = (index * self.hop_size) as isize - half;
        for (i, slot) in out.iter_mut().enumerate().take(self.frame_size) {
            let pos = start + i as isize;
            *slot = if pos >= 0 && (pos as usize) < samples.len() {
                samples[pos as usize]
            } else {
                0.0
            };
        }
    }
}

/// Periodic Hann window
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Power spectrogram, one row of `frame_size / 2 + 1` bins per frame
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub power: Vec<Vec<f32>>,
    pub frame_size: usize,
    pub sample_rate: u32,
}

impl Spectrogram {
    /// Compute the power spectrogram of `samples`
    pub fn compute(
        samples: &[f32],
        sample_rate: u32,
        frames: &FrameConfig,
    ) -> Result<Self, FeatureExtractionError> {
        if samples.is_empty() {
            return Err(FeatureExtractionError::InvalidInput(
                "Empty input samples".to_string(),
            ));
        }
        if sample_rate == 0 {
            return Err(FeatureExtractionError::InvalidInput(
                "Sample rate must be positive".to_string(),
            ));
        }

        let n_fft = frames.frame_size;
        let n_frames = frames.frame_count(samples.len());

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let window = hann_window(n_fft);

        let mut frame_buf = fft.make_input_vec();
        let mut spectrum = fft.make_output_vec();
        let mut scratch = fft.make_scratch_vec();
        let mut power = Vec::with_capacity(n_frames);

        for frame_idx in 0..n_frames {
            frames.fill_frame(samples, frame_idx, &mut frame_buf);
            for (s, w) in frame_buf.iter_mut().zip(window.iter()) {
                *s *= w;
            }

            fft.process_with_scratch(&mut frame_buf, &mut spectrum, &mut scratch)
                .map_err(|e| FeatureExtractionError::Fft(format!("{:?}", e)))?;

            power.push(spectrum.iter().map(|c| c.norm_sqr()).collect());
        }

        Ok(Self {
            power,
            frame_size: n_fft,
            sample_rate,
        })
    }

    pub fn n_frames(&self) -> usize {
        self.power.len()
    }

    pub fn n_bins(&self) -> usize {
        self.frame_size / 2 + 1
    }

    /// Centre frequency of bin `k` in Hz
    pub fn bin_frequency(&self, k: usize) -> f32 {
        k as f32 * self.sample_rate as f32 / self.frame_size as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count() {
        let frames = FrameConfig::default();
        assert_eq!(frames.frame_count(0), 0);
        assert_eq!(frames.frame_count(1), 1);
        assert_eq!(frames.frame_count(512), 2);
        assert_eq!(frames.frame_count(44100), 87);
    }

    #[test]
    fn test_fill_frame_is_centered() {
        let frames = FrameConfig::new(4, 2);
        let samples = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut out = [0.0; 4];

        frames.fill_frame(&samples, 0, &mut out);
        assert_eq!(out, [0.0, 0.0, 1.0, 2.0]);

        frames.fill_frame(&samples, 2, &mut out);
        assert_eq!(out, [3.0, 4.0, 5.0, 0.0]);
    }

    #[test]
    fn test_sine_peak_bin() {
        let sr = 44100;
        let samples: Vec<f32> = (0..sr)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sr as f32).sin())
            .collect();
        let spec = Spectrogram::compute(&samples, sr, &FrameConfig::default()).unwrap();
        assert_eq!(spec.n_frames(), 87);

        let mid = &spec.power[40];
        let peak = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(k, _)| k)
            .unwrap();
        assert!((spec.bin_frequency(peak) - 1000.0).abs() < 25.0);
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(Spectrogram::compute(&[], 44100, &FrameConfig::default()).is_err());
    }

    #[test]
    fn test_hann_window_endpoints() {
        let w = hann_window(8);
        assert_eq!(w[0], 0.0);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }
}
