//! Per-frame spectral and temporal descriptors
//!
//! Spectral shape descriptors (centroid, bandwidth, rolloff) work on the
//! magnitude spectrum; chroma works on power. Silent frames yield 0.

use super::stft::{FrameConfig, Spectrogram};

/// Energy threshold below which a frame counts as silent
const SILENCE: f32 = 1e-10;

/// Fraction of spectral energy below the rolloff frequency
pub const ROLLOFF_PERCENT: f32 = 0.85;

/// Number of pitch classes
pub const N_CHROMA: usize = 12;

/// Lowest frequency assigned to a pitch class
const CHROMA_MIN_HZ: f32 = 20.0;

fn magnitudes(power: &[f32]) -> Vec<f32> {
    power.iter().map(|p| p.sqrt()).collect()
}

/// Spectral centroid per frame in Hz
pub fn spectral_centroid(spec: &Spectrogram) -> Vec<f32> {
    spec.power
        .iter()
        .map(|frame| frame_centroid(spec, &magnitudes(frame)))
        .collect()
}

fn frame_centroid(spec: &Spectrogram, mags: &[f32]) -> f32 {
    let total: f32 = mags.iter().sum();
    if total < SILENCE {
        return 0.0;
    }
    mags.iter()
        .enumerate()
        .map(|(k, &m)| spec.bin_frequency(k) * m)
        .sum::<f32>()
        / total
}

/// Spectral bandwidth (2nd order spread around the centroid) per frame in Hz
pub fn spectral_bandwidth(spec: &Spectrogram) -> Vec<f32> {
    spec.power
        .iter()
        .map(|frame| {
            let mags = magnitudes(frame);
            let total: f32 = mags.iter().sum();
            if total < SILENCE {
                return 0.0;
            }
            let centroid = frame_centroid(spec, &mags);
            mags.iter()
                .enumerate()
                .map(|(k, &m)| (m / total) * (spec.bin_frequency(k) - centroid).powi(2))
                .sum::<f32>()
                .sqrt()
        })
        .collect()
}

/// Spectral rolloff per frame in Hz
pub fn spectral_rolloff(spec: &Spectrogram) -> Vec<f32> {
    spec.power
        .iter()
        .map(|frame| {
            let mags = magnitudes(frame);
            let total: f32 = mags.iter().sum();
            if total < SILENCE {
                return 0.0;
            }
            let threshold = ROLLOFF_PERCENT * total;
            let mut cumulative = 0.0;
            for (k, &m) in mags.iter().enumerate() {
                cumulative += m;
                if cumulative >= threshold {
                    return spec.bin_frequency(k);
                }
            }
            spec.bin_frequency(mags.len().saturating_sub(1))
        })
        .collect()
}

/// Zero-crossing rate per centered frame (fraction of sign changes)
pub fn zero_crossing_rate(samples: &[f32], frames: &FrameConfig) -> Vec<f32> {
    let n_frames = frames.frame_count(samples.len());
    let mut buf = vec![0.0f32; frames.frame_size];

    (0..n_frames)
        .map(|idx| {
            frames.fill_frame(samples, idx, &mut buf);
            let crossings = buf
                .windows(2)
                .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
                .count();
            crossings as f32 / frames.frame_size as f32
        })
        .collect()
}

/// Root-mean-square amplitude per centered frame
pub fn rms(samples: &[f32], frames: &FrameConfig) -> Vec<f32> {
    let n_frames = frames.frame_count(samples.len());
    let mut buf = vec![0.0f32; frames.frame_size];

    (0..n_frames)
        .map(|idx| {
            frames.fill_frame(samples, idx, &mut buf);
            (buf.iter().map(|&s| s * s).sum::<f32>() / frames.frame_size as f32).sqrt()
        })
        .collect()
}

/// RMS of a whole buffer
pub fn signal_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Pitch class (C = 0) of each spectral bin, `None` below 20 Hz
fn chroma_map(spec: &Spectrogram) -> Vec<Option<usize>> {
    (0..spec.n_bins())
        .map(|k| {
            let freq = spec.bin_frequency(k);
            if freq < CHROMA_MIN_HZ {
                return None;
            }
            let midi = 12.0 * (freq / 440.0).log2() + 69.0;
            Some((midi.round() as i64).rem_euclid(N_CHROMA as i64) as usize)
        })
        .collect()
}

/// Chromagram: per-frame pitch class energy, each frame scaled to max 1
pub fn chroma(spec: &Spectrogram) -> Vec<[f32; N_CHROMA]> {
    let map = chroma_map(spec);

    spec.power
        .iter()
        .map(|frame| {
            let mut bins = [0.0f32; N_CHROMA];
            for (&p, class) in frame.iter().zip(map.iter()) {
                if let Some(c) = class {
                    bins[*c] += p;
                }
            }
            let max = bins.iter().cloned().fold(0.0f32, f32::max);
            if max > SILENCE {
                for b in &mut bins {
                    *b /= max;
                }
            } else {
                bins = [0.0; N_CHROMA];
            }
            bins
        })
        .collect()
}

/// Mean of each pitch class over all frames
pub fn chroma_mean(chromagram: &[[f32; N_CHROMA]]) -> [f32; N_CHROMA] {
    let mut mean = [0.0f32; N_CHROMA];
    if chromagram.is_empty() {
        return mean;
    }
    for frame in chromagram {
        for (m, v) in mean.iter_mut().zip(frame.iter()) {
            *m += v;
        }
    }
    for m in &mut mean {
        *m /= chromagram.len() as f32;
    }
    mean
}

/// Arithmetic mean of a series (0 for an empty one)
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, secs: f32) -> Vec<f32> {
        (0..(sr as f32 * secs) as usize)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_centroid_tracks_pitch() {
        let frames = FrameConfig::default();
        let low = Spectrogram::compute(&sine(300.0, 44100, 1.0), 44100, &frames).unwrap();
        let high = Spectrogram::compute(&sine(5000.0, 44100, 1.0), 44100, &frames).unwrap();

        let c_low = spectral_centroid(&low)[40];
        let c_high = spectral_centroid(&high)[40];
        assert!((c_low - 300.0).abs() < 100.0, "low centroid {}", c_low);
        assert!((c_high - 5000.0).abs() < 200.0, "high centroid {}", c_high);
    }

    #[test]
    fn test_silence_is_zero() {
        let frames = FrameConfig::default();
        let silent = vec![0.0f32; 8192];
        let spec = Spectrogram::compute(&silent, 44100, &frames).unwrap();

        assert!(spectral_centroid(&spec).iter().all(|&v| v == 0.0));
        assert!(spectral_bandwidth(&spec).iter().all(|&v| v == 0.0));
        assert!(spectral_rolloff(&spec).iter().all(|&v| v == 0.0));
        assert!(rms(&silent, &frames).iter().all(|&v| v == 0.0));
        assert_eq!(chroma_mean(&chroma(&spec)), [0.0; N_CHROMA]);
    }

    #[test]
    fn test_rolloff_above_pure_tone() {
        let frames = FrameConfig::default();
        let spec = Spectrogram::compute(&sine(1000.0, 44100, 1.0), 44100, &frames).unwrap();
        let rolloff = spectral_rolloff(&spec)[40];
        assert!(rolloff >= 900.0 && rolloff < 3000.0, "rolloff {}", rolloff);
    }

    #[test]
    fn test_zcr_of_sine() {
        // 1 kHz sine crosses zero 2000 times per second
        let frames = FrameConfig::default();
        let zcr = zero_crossing_rate(&sine(1000.0, 44100, 1.0), &frames);
        let expected = 2000.0 / 44100.0;
        assert!((zcr[40] - expected).abs() < 0.005, "zcr {}", zcr[40]);
    }

    #[test]
    fn test_rms_of_sine() {
        let frames = FrameConfig::default();
        let values = rms(&sine(440.0, 44100, 1.0), &frames);
        // 0.5 amplitude sine → 0.5 / sqrt(2)
        assert!((values[40] - 0.3536).abs() < 0.01);
        assert!((signal_rms(&[3.0, -3.0]) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_chroma_of_a440() {
        let frames = FrameConfig::default();
        let spec = Spectrogram::compute(&sine(440.0, 44100, 1.0), 44100, &frames).unwrap();
        let mean = chroma_mean(&chroma(&spec));
        let best = mean
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(best, 9, "A should be pitch class 9, chroma {:?}", mean);
    }
}
