//! Common types for Aura
//!
//! Sample rate defaults, analysis frame geometry and the [`Waveform`] value
//! passed between the decoder and every analysis stage.

/// Default sample rate for analysis (CD rate, what the visualizer streams at)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// STFT frame length in samples
pub const FRAME_SIZE: usize = 2048;

/// Hop between consecutive analysis frames in samples
pub const HOP_SIZE: usize = 512;

/// Waveform overview size for whole-file analysis
pub const WAVEFORM_POINTS: usize = 1000;

/// Waveform overview size for live chunk analysis
pub const CHUNK_WAVEFORM_POINTS: usize = 100;

/// Audio sample type
pub type Sample = f32;

/// Mono audio at a known sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<Sample>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<Sample>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if there are no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds (0 when the sample rate is unknown)
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
