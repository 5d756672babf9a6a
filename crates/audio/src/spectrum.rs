//! Short-time spectra and the scale conversions applied to them.

use std::sync::Arc;

use anyhow::{Context, Result};
use ndarray::Array2;
use realfft::{RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::dsp::centered_frame_count;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SpectrogramConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    /// Dynamic range kept below the loudest bin.
    pub top_db: f32,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            top_db: 80.0,
        }
    }
}

/// Centered short-time Fourier transform with a periodic Hann window.
///
/// Frames are centered on `t * hop_length`; the signal is zero padded by
/// `n_fft / 2` on both sides.
pub struct Stft {
    n_fft: usize,
    hop_length: usize,
    window: Vec<f32>,
    fft: Arc<dyn RealToComplex<f32>>,
}

impl Stft {
    pub fn new(n_fft: usize, hop_length: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);
        let window = (0..n_fft)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / n_fft as f32;
                0.5 - 0.5 * phase.cos()
            })
            .collect();
        Self {
            n_fft,
            hop_length: hop_length.max(1),
            window,
            fft,
        }
    }

    pub fn from_config(config: &SpectrogramConfig) -> Self {
        Self::new(config.n_fft, config.hop_length)
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop_length(&self) -> usize {
        self.hop_length
    }

    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    pub fn frame_count(&self, len: usize) -> usize {
        centered_frame_count(len, self.n_fft, self.hop_length)
    }

    /// `|X|` with shape `(bins, frames)`.
    pub fn magnitude(&self, samples: &[f32]) -> Result<Array2<f32>> {
        self.transform(samples, |c| c.norm())
    }

    /// `|X|^2` with shape `(bins, frames)`.
    pub fn power(&self, samples: &[f32]) -> Result<Array2<f32>> {
        self.transform(samples, |c| c.norm_sqr())
    }

    fn transform<F>(&self, samples: &[f32], value: F) -> Result<Array2<f32>>
    where
        F: Fn(&realfft::num_complex::Complex<f32>) -> f32,
    {
        let frames = self.frame_count(samples.len());
        let mut out = Array2::<f32>::zeros((self.bins(), frames));
        let mut input = self.fft.make_input_vec();
        let mut spectrum = self.fft.make_output_vec();
        let pad = (self.n_fft / 2) as isize;

        for frame in 0..frames {
            let origin = (frame * self.hop_length) as isize - pad;
            for (i, slot) in input.iter_mut().enumerate() {
                let index = origin + i as isize;
                *slot = if index >= 0 && (index as usize) < samples.len() {
                    samples[index as usize] * self.window[i]
                } else {
                    0.0
                };
            }
            self.fft
                .process(&mut input, &mut spectrum)
                .with_context(|| format!("fft of frame {frame}"))?;
            for (bin, c) in spectrum.iter().enumerate() {
                out[[bin, frame]] = value(c);
            }
        }
        Ok(out)
    }
}

/// Converts an amplitude spectrogram to decibels relative to its maximum.
///
/// Values are floored at `max - top_db`.
pub fn amplitude_to_db(amplitude: &Array2<f32>, top_db: Option<f32>) -> Array2<f32> {
    const AMIN: f32 = 1e-5;
    let reference = amplitude.iter().copied().fold(0.0_f32, f32::max);
    let offset = 20.0 * reference.max(AMIN).log10();
    let mut db = amplitude.mapv(|a| 20.0 * a.max(AMIN).log10() - offset);
    clamp_dynamic_range(&mut db, top_db);
    db
}

/// Converts a power spectrogram to decibels against a fixed reference power.
pub fn power_to_db(power: &Array2<f32>, reference: f32, top_db: Option<f32>) -> Array2<f32> {
    const AMIN: f32 = 1e-10;
    let offset = 10.0 * reference.abs().max(AMIN).log10();
    let mut db = power.mapv(|p| 10.0 * p.max(AMIN).log10() - offset);
    clamp_dynamic_range(&mut db, top_db);
    db
}

fn clamp_dynamic_range(db: &mut Array2<f32>, top_db: Option<f32>) {
    if let Some(top_db) = top_db {
        let peak = db.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let floor = peak - top_db;
        db.mapv_inplace(|v| v.max(floor));
    }
}

/// Center frequency of every STFT bin.
pub fn fft_frequencies(sample_rate: u32, n_fft: usize) -> Vec<f32> {
    let bins = n_fft / 2 + 1;
    (0..bins)
        .map(|bin| bin as f32 * sample_rate as f32 / n_fft as f32)
        .collect()
}

pub fn frames_to_time(frame: usize, sample_rate: u32, hop_length: usize) -> f64 {
    (frame * hop_length) as f64 / sample_rate as f64
}

const MEL_F_SP: f64 = 200.0 / 3.0;
const MEL_MIN_LOG_HZ: f64 = 1000.0;
const MEL_MIN_LOG_MEL: f64 = MEL_MIN_LOG_HZ / MEL_F_SP;

fn mel_log_step() -> f64 {
    6.4_f64.ln() / 27.0
}

/// Slaney mel scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MEL_MIN_LOG_HZ {
        MEL_MIN_LOG_MEL + (hz / MEL_MIN_LOG_HZ).ln() / mel_log_step()
    } else {
        hz / MEL_F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MEL_MIN_LOG_MEL {
        MEL_MIN_LOG_HZ * (mel_log_step() * (mel - MEL_MIN_LOG_MEL)).exp()
    } else {
        mel * MEL_F_SP
    }
}

/// Triangular mel filters with Slaney area normalisation.
#[derive(Clone, Debug)]
pub struct MelFilterbank {
    weights: Array2<f32>,
}

impl MelFilterbank {
    pub fn new(sample_rate: u32, n_fft: usize, n_mels: usize, fmin: f64, fmax: Option<f64>) -> Self {
        let fmax = fmax.unwrap_or(sample_rate as f64 / 2.0);
        let bins = n_fft / 2 + 1;
        let fft_freqs: Vec<f64> = (0..bins)
            .map(|bin| bin as f64 * sample_rate as f64 / n_fft as f64)
            .collect();

        let min_mel = hz_to_mel(fmin);
        let max_mel = hz_to_mel(fmax);
        let mel_f: Vec<f64> = (0..n_mels + 2)
            .map(|i| mel_to_hz(min_mel + (max_mel - min_mel) * i as f64 / (n_mels + 1) as f64))
            .collect();

        let mut weights = Array2::<f32>::zeros((n_mels, bins));
        for m in 0..n_mels {
            let lower_width = mel_f[m + 1] - mel_f[m];
            let upper_width = mel_f[m + 2] - mel_f[m + 1];
            let enorm = 2.0 / (mel_f[m + 2] - mel_f[m]);
            for (bin, &freq) in fft_freqs.iter().enumerate() {
                let lower = (freq - mel_f[m]) / lower_width;
                let upper = (mel_f[m + 2] - freq) / upper_width;
                let w = lower.min(upper).max(0.0);
                weights[[m, bin]] = (w * enorm) as f32;
            }
        }
        Self { weights }
    }

    pub fn n_mels(&self) -> usize {
        self.weights.nrows()
    }

    /// Projects a `(bins, frames)` power spectrogram onto the mel bands.
    pub fn apply(&self, power: &Array2<f32>) -> Array2<f32> {
        self.weights.dot(power)
    }
}
