//! Waveform overview for rendering
//!
//! Reduces a signal to at most `points` amplitude values by averaging
//! contiguous chunks of `len / points` samples. A trailing partial chunk is
//! dropped so the result is exactly `points` long.

/// Downsample `samples` to at most `points` values
///
/// Input with `len <= points` is returned unchanged.
pub fn downsample(samples: &[f32], points: usize) -> Vec<f32> {
    if samples.len() <= points {
        return samples.to_vec();
    }
    if points == 0 {
        return Vec::new();
    }

    let chunk = samples.len() / points;
    samples
        .chunks(chunk)
        .take(points)
        .map(|c| c.iter().sum::<f32>() / c.len() as f32)
        .collect()
}
