use std::ops::Range;

use anyhow::{Context, Result};
use rubato::{FftFixedIn, Resampler};
use serde::{Deserialize, Serialize};

/// Scales `buffer` so its loudest sample has magnitude one and returns the
/// gain that was divided out. Silent buffers are left untouched.
pub fn normalize_buffer(buffer: &mut [f32]) -> f32 {
    let peak = buffer.iter().fold(0.0_f32, |acc, s| acc.max(s.abs()));
    if peak <= f32::MIN_POSITIVE {
        return 1.0;
    }
    for sample in buffer.iter_mut() {
        *sample /= peak;
    }
    peak
}

/// Averages interleaved frames into a single channel.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let inv = 1.0 / channels as f32;
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() * inv)
        .collect()
}

const RESAMPLE_CHUNK: usize = 1024;

/// Band-limited resampling of a mono buffer.
///
/// The output holds `ceil(len * to / from)` samples with the resampler's
/// group delay removed.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    let mut resampler = FftFixedIn::<f32>::new(from as usize, to as usize, RESAMPLE_CHUNK, 2, 1)
        .context("initialize resampler")?;
    let delay = resampler.output_delay();
    let expected = (samples.len() as u64 * to as u64).div_ceil(from as u64) as usize;

    let mut output = vec![vec![0.0f32; resampler.output_frames_max()]; 1];
    let mut resampled = Vec::with_capacity(expected + delay);
    let mut chunk = Vec::with_capacity(RESAMPLE_CHUNK);
    let mut position = 0;
    while resampled.len() < expected + delay {
        let needed = resampler.input_frames_next();
        chunk.clear();
        let end = (position + needed).min(samples.len());
        chunk.extend_from_slice(&samples[position..end]);
        chunk.resize(needed, 0.0);
        position = end;

        let input = [chunk.as_slice()];
        let (_, out_len) = resampler
            .process_into_buffer(&input[..], &mut output, None)
            .context("resample chunk")?;
        if out_len == 0 && position >= samples.len() {
            break;
        }
        resampled.extend_from_slice(&output[0][..out_len]);
    }

    resampled.drain(..delay.min(resampled.len()));
    resampled.truncate(expected);
    Ok(resampled)
}

/// Frame count of a centered framing with `frame_length / 2` zero padding on
/// both sides.
pub fn centered_frame_count(len: usize, frame_length: usize, hop_length: usize) -> usize {
    let padded = len + 2 * (frame_length / 2);
    if padded < frame_length {
        return 0;
    }
    1 + (padded - frame_length) / hop_length
}

/// Root-mean-square energy per centered frame.
pub fn frame_rms(samples: &[f32], frame_length: usize, hop_length: usize) -> Vec<f32> {
    let pad = frame_length / 2;
    (0..centered_frame_count(samples.len(), frame_length, hop_length))
        .map(|frame| {
            // frame covers padded[start..start + frame_length]
            let start = frame * hop_length;
            let lo = start.saturating_sub(pad).min(samples.len());
            let hi = (start + frame_length).saturating_sub(pad).min(samples.len());
            let energy: f32 = samples[lo..hi].iter().map(|s| s * s).sum();
            (energy / frame_length as f32).sqrt()
        })
        .collect()
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrimConfig {
    /// Frames quieter than the loudest frame by more than this are silence.
    pub top_db: f32,
    pub frame_length: usize,
    pub hop_length: usize,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            top_db: 60.0,
            frame_length: 2048,
            hop_length: 512,
        }
    }
}

/// Sample range left after removing leading and trailing near-silence.
///
/// A frame is kept when its power is within `top_db` of the loudest frame.
/// The range starts at the first kept frame and ends one hop after the last
/// kept frame, clamped to the buffer.
pub fn trim_silence(samples: &[f32], config: &TrimConfig) -> Range<usize> {
    const AMIN: f32 = 1e-10;

    let rms = frame_rms(samples, config.frame_length, config.hop_length);
    let power: Vec<f32> = rms.iter().map(|r| r * r).collect();
    let reference = power.iter().copied().fold(0.0_f32, f32::max).max(AMIN);
    let threshold = -config.top_db;
    let loud = |p: &f32| 10.0 * (p.max(AMIN) / reference).log10() > threshold;

    let first = power.iter().position(loud);
    let last = power.iter().rposition(loud);
    match (first, last) {
        (Some(first), Some(last)) => {
            let start = (first * config.hop_length).min(samples.len());
            let end = ((last + 1) * config.hop_length).min(samples.len());
            start..end
        }
        _ => 0..0,
    }
}

pub fn trimmed<'a>(samples: &'a [f32], config: &TrimConfig) -> &'a [f32] {
    &samples[trim_silence(samples, config)]
}
