//! Audio file loading
//!
//! Decodes any container/codec Symphonia supports, downmixes to mono and
//! resamples to the analysis rate. This is the only place file I/O happens
//! during analysis.

use std::fs::File;
use std::path::Path;

use rubato::{FftFixedIn, Resampler};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::DecodeError;
use crate::types::Waveform;

/// Input block size for the FFT resampler
const RESAMPLE_CHUNK: usize = 4096;

/// Load an audio file as mono at `target_sample_rate`
pub fn load_audio(path: &Path, target_sample_rate: u32) -> Result<Waveform, DecodeError> {
    log::info!("load_audio: Decoding {:?}", path);

    let (interleaved, source_rate, channels) = decode_interleaved(path)?;
    let mono = downmix_to_mono(&interleaved, channels);
    if mono.is_empty() {
        return Err(DecodeError::Empty);
    }

    let samples = if source_rate == target_sample_rate {
        mono
    } else {
        log::debug!(
            "load_audio: Resampling {} Hz -> {} Hz ({} frames)",
            source_rate,
            target_sample_rate,
            mono.len()
        );
        resample(&mono, source_rate, target_sample_rate)?
    };

    let waveform = Waveform::new(samples, target_sample_rate);
    log::info!(
        "load_audio: {} channel(s) at {} Hz, {:.2}s after conversion",
        channels,
        source_rate,
        waveform.duration_secs()
    );
    Ok(waveform)
}

/// Decode the first audio track to interleaved f32 samples
///
/// Returns (samples, sample_rate, channel_count).
fn decode_interleaved(path: &Path) -> Result<(Vec<f32>, u32, usize), DecodeError> {
    let file = File::open(path).map_err(|e| DecodeError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;

    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::Unsupported("Unknown sample rate".to_string()))?;

    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                log::warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::warn!("Error decoding packet: {}", e);
                continue;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count().max(1);
            let duration = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    Ok((samples, sample_rate, channels))
}

/// Average interleaved channels into one
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample a mono signal, compensating the resampler's delay
///
/// Output length is `round(len * to / from)`.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>, DecodeError> {
    if from == 0 || to == 0 {
        return Err(DecodeError::Resample(format!(
            "invalid rates {} -> {}",
            from, to
        )));
    }

    let mut resampler = FftFixedIn::<f32>::new(from as usize, to as usize, RESAMPLE_CHUNK, 2, 1)
        .map_err(|e| DecodeError::Resample(e.to_string()))?;

    let expected = (samples.len() as f64 * to as f64 / from as f64).round() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<f32> = Vec::with_capacity(expected + delay);

    let mut pos = 0;
    while pos + resampler.input_frames_next() <= samples.len() {
        let n = resampler.input_frames_next();
        let block = resampler
            .process(&[&samples[pos..pos + n]], None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        output.extend_from_slice(&block[0]);
        pos += n;
    }

    if pos < samples.len() {
        let block = resampler
            .process_partial(Some(&[&samples[pos..]]), None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        output.extend_from_slice(&block[0]);
    }

    // Flush until the delayed tail is out
    while output.len() < expected + delay {
        let block = resampler
            .process_partial(None::<&[&[f32]]>, None)
            .map_err(|e| DecodeError::Resample(e.to_string()))?;
        if block[0].is_empty() {
            break;
        }
        output.extend_from_slice(&block[0]);
    }

    let mut output = output.split_off(delay.min(output.len()));
    output.resize(expected, 0.0);
    Ok(output)
}
