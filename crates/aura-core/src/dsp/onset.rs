//! Onset strength envelope and onset picking

use super::stft::FrameConfig;

/// Onset strength per frame: mean positive dB increase across mel bands
///
/// The first frame has no predecessor and is 0.
pub fn onset_strength(mel_db: &[Vec<f32>]) -> Vec<f32> {
    let mut envelope = vec![0.0f32; mel_db.len()];

    for (i, value) in envelope.iter_mut().enumerate().skip(1) {
        let prev = &mel_db[i - 1];
        let curr = &mel_db[i];
        if curr.is_empty() {
            continue;
        }
        let rise: f32 = curr
            .iter()
            .zip(prev.iter())
            .map(|(&c, &p)| (c - p).max(0.0))
            .sum();
        *value = rise / curr.len() as f32;
    }

    envelope
}

/// Peak picker over a normalized onset envelope
///
/// A frame is an onset when it is the local maximum of its
/// `[i - pre_max, i + post_max]` neighbourhood, exceeds the mean of
/// `[i - pre_avg, i + post_avg]` by `delta`, and comes at least `wait`
/// frames after the previous onset.
#[derive(Debug, Clone)]
pub struct OnsetDetector {
    pre_max: usize,
    post_max: usize,
    pre_avg: usize,
    post_avg: usize,
    delta: f32,
    wait: usize,
}

impl OnsetDetector {
    /// Windows of ±30 ms (max), ±100 ms (mean), 30 ms refractory period
    pub fn new(frames: &FrameConfig, sample_rate: u32) -> Self {
        let max_window = frames.frames_in(0.03, sample_rate);
        let avg_window = frames.frames_in(0.10, sample_rate);
        Self {
            pre_max: max_window,
            post_max: max_window,
            pre_avg: avg_window,
            post_avg: avg_window,
            delta: 0.07,
            wait: max_window,
        }
    }

    /// Onset frame indices, ascending
    pub fn detect(&self, envelope: &[f32]) -> Vec<usize> {
        let normalized = match normalize(envelope) {
            Some(n) => n,
            None => return Vec::new(),
        };
        let len = normalized.len();
        let mut onsets: Vec<usize> = Vec::new();

        for i in 0..len {
            let lo = i.saturating_sub(self.pre_max);
            let hi = (i + self.post_max).min(len - 1);
            let value = normalized[i];

            if normalized[lo..=hi].iter().any(|&v| v > value) {
                continue;
            }

            let avg_lo = i.saturating_sub(self.pre_avg);
            let avg_hi = (i + self.post_avg).min(len - 1);
            let window = &normalized[avg_lo..=avg_hi];
            let local_mean = window.iter().sum::<f32>() / window.len() as f32;
            if value < local_mean + self.delta {
                continue;
            }

            if let Some(&last) = onsets.last() {
                if i - last <= self.wait {
                    continue;
                }
            }

            onsets.push(i);
        }

        onsets
    }

    /// Onset times in seconds
    pub fn detect_times(&self, envelope: &[f32], frames: &FrameConfig, sample_rate: u32) -> Vec<f32> {
        self.detect(envelope)
            .into_iter()
            .map(|idx| frames.frame_time(idx, sample_rate))
            .collect()
    }
}

/// Scale to [0, 1]; `None` for a flat envelope
fn normalize(envelope: &[f32]) -> Option<Vec<f32>> {
    let min = envelope.iter().cloned().fold(f32::INFINITY, f32::min);
    let max = envelope.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if !range.is_finite() || range < 1e-9 {
        return None;
    }
    Some(envelope.iter().map(|&v| (v - min) / range).collect())
}
