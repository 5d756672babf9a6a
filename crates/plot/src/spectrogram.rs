use std::ops::RangeInclusive;

use anyhow::{ensure, Result};
use bpmscope_audio::{amplitude_to_db, SpectrogramConfig, Stft};
use bpmscope_domain::AudioSignal;
use egui::ColorImage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::colormap::magma;

/// Below this frequency the log axis is linear (C2).
pub const LOG_AXIS_LINEAR_HZ: f32 = 65.406;
/// Share of the log axis, in octaves, given to the linear region.
const LOG_AXIS_LINEAR_SPAN: f32 = 0.5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrequencyScale {
    Linear,
    Log,
}

impl FrequencyScale {
    pub fn title(self) -> &'static str {
        match self {
            FrequencyScale::Linear => "Linear-Frequency Power Spectrogram",
            FrequencyScale::Log => "Logarithmic-Frequency Power Spectrogram",
        }
    }

    /// Position of `hz` along the axis, 0 at the bottom and 1 at `max_hz`.
    pub fn position(self, hz: f32, max_hz: f32) -> f32 {
        if max_hz <= 0.0 {
            return 0.0;
        }
        let hz = hz.clamp(0.0, max_hz);
        match self {
            FrequencyScale::Linear => hz / max_hz,
            FrequencyScale::Log => symlog(hz) / symlog(max_hz),
        }
    }

    /// Inverse of [`FrequencyScale::position`].
    pub fn frequency(self, position: f32, max_hz: f32) -> f32 {
        let position = position.clamp(0.0, 1.0);
        match self {
            FrequencyScale::Linear => position * max_hz,
            FrequencyScale::Log => inverse_symlog(position * symlog(max_hz)),
        }
    }

    /// Labelled frequency ticks up to `max_hz`.
    pub fn ticks(self, max_hz: f32) -> Vec<f32> {
        match self {
            FrequencyScale::Linear => {
                let step = if max_hz > 8000.0 { 2000.0 } else { 1000.0 };
                (0..)
                    .map(|i| i as f32 * step)
                    .take_while(|&hz| hz <= max_hz)
                    .collect()
            }
            FrequencyScale::Log => std::iter::once(0.0)
                .chain((6..).map(|exp| 2f32.powi(exp)))
                .take_while(|&hz| hz <= max_hz)
                .collect(),
        }
    }
}

fn symlog(hz: f32) -> f32 {
    if hz <= LOG_AXIS_LINEAR_HZ {
        LOG_AXIS_LINEAR_SPAN * hz / LOG_AXIS_LINEAR_HZ
    } else {
        LOG_AXIS_LINEAR_SPAN + (hz / LOG_AXIS_LINEAR_HZ).log2()
    }
}

fn inverse_symlog(value: f32) -> f32 {
    if value <= LOG_AXIS_LINEAR_SPAN {
        value / LOG_AXIS_LINEAR_SPAN * LOG_AXIS_LINEAR_HZ
    } else {
        LOG_AXIS_LINEAR_HZ * 2f32.powf(value - LOG_AXIS_LINEAR_SPAN)
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct RenderConfig {
    pub spectrogram: SpectrogramConfig,
    /// Image rows; one row may cover several bins or share one.
    pub height: usize,
    /// Frames beyond this width are max-pooled into columns.
    pub max_width: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            spectrogram: SpectrogramConfig::default(),
            height: 256,
            max_width: 2048,
        }
    }
}

/// Magnitude spectrogram in decibels relative to its loudest bin.
pub struct DbSpectrogram {
    db: Array2<f32>,
    sample_rate: u32,
    n_fft: usize,
    samples: usize,
}

impl DbSpectrogram {
    #[instrument(skip_all, fields(samples = signal.len()))]
    pub fn compute(signal: &AudioSignal, config: &SpectrogramConfig) -> Result<Self> {
        ensure!(config.n_fft >= 2, "n_fft must be at least 2");
        let stft = Stft::from_config(config);
        let magnitude = stft.magnitude(signal.samples())?;
        let db = amplitude_to_db(&magnitude, Some(config.top_db));
        debug!(bins = db.nrows(), frames = db.ncols(), "spectrogram computed");
        Ok(Self {
            db,
            sample_rate: signal.sample_rate(),
            n_fft: stft.n_fft(),
            samples: signal.len(),
        })
    }

    pub fn bins(&self) -> usize {
        self.db.nrows()
    }

    pub fn frames(&self) -> usize {
        self.db.ncols()
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples as f64 / self.sample_rate as f64
    }

    /// Range of the stored values; the floor sits `top_db` below the peak
    /// unless the input had less dynamic range.
    pub fn db_range(&self) -> RangeInclusive<f32> {
        let (lo, hi) = self
            .db
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if lo.is_finite() {
            lo..=hi
        } else {
            0.0..=0.0
        }
    }

    pub fn render(&self, scale: FrequencyScale, config: &RenderConfig) -> SpectrogramImage {
        let height = config.height.max(1);
        let frames = self.frames();
        let width = frames.clamp(1, config.max_width.max(1));
        let range = self.db_range();
        let span = (range.end() - range.start()).max(f32::EPSILON);
        let rows = self.row_bins(scale, height);

        let mut pixels = Vec::with_capacity(width * height);
        for bins in &rows {
            for column in 0..width {
                let level = if frames == 0 {
                    0.0
                } else {
                    let first = column * frames / width;
                    let last = ((column + 1) * frames / width).max(first + 1);
                    let mut peak = f32::NEG_INFINITY;
                    for bin in bins.clone() {
                        for frame in first..last {
                            peak = peak.max(self.db[[bin, frame]]);
                        }
                    }
                    (peak - range.start()) / span
                };
                pixels.push(magma(level));
            }
        }

        SpectrogramImage {
            scale,
            image: ColorImage {
                size: [width, height],
                pixels,
            },
            duration_seconds: self.duration_seconds(),
            max_frequency_hz: self.nyquist(),
            db_range: range,
        }
    }

    /// Bins covered by every image row, top row first.
    fn row_bins(&self, scale: FrequencyScale, height: usize) -> Vec<RangeInclusive<usize>> {
        let bin_hz = self.sample_rate as f32 / self.n_fft as f32;
        let last_bin = self.bins().saturating_sub(1);
        let max_hz = self.nyquist();
        (0..height)
            .map(|row| {
                let top = 1.0 - row as f32 / height as f32;
                let bottom = 1.0 - (row + 1) as f32 / height as f32;
                let lo = (scale.frequency(bottom, max_hz) / bin_hz).round() as usize;
                let hi = (scale.frequency(top, max_hz) / bin_hz).round() as usize;
                let lo = lo.min(last_bin);
                let hi = hi.clamp(lo, last_bin);
                lo..=hi
            })
            .collect()
    }
}

/// Colour image of one spectrogram plus what is needed to label its axes.
#[derive(Clone)]
pub struct SpectrogramImage {
    pub scale: FrequencyScale,
    pub image: ColorImage,
    pub duration_seconds: f64,
    pub max_frequency_hz: f32,
    pub db_range: RangeInclusive<f32>,
}

impl SpectrogramImage {
    pub fn title(&self) -> &'static str {
        self.scale.title()
    }

    pub fn width(&self) -> usize {
        self.image.size[0]
    }

    pub fn height(&self) -> usize {
        self.image.size[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use bpmscope_audio::spectrum::fft_frequencies;

    const SR: u32 = 22_050;

    fn sine(hz: f32, seconds: f32) -> AudioSignal {
        let len = (seconds * SR as f32) as usize;
        let samples = (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * hz * i as f32 / SR as f32).sin() * 0.5)
            .collect();
        AudioSignal::new(samples, SR).unwrap()
    }

    #[test]
    fn titles_match_the_plots() {
        assert_eq!(FrequencyScale::Linear.title(), "Linear-Frequency Power Spectrogram");
        assert_eq!(
            FrequencyScale::Log.title(),
            "Logarithmic-Frequency Power Spectrogram"
        );
    }

    #[test]
    fn axis_mapping_inverts() {
        for scale in [FrequencyScale::Linear, FrequencyScale::Log] {
            for hz in [0.0, 30.0, 65.406, 440.0, 5000.0, 11_025.0] {
                let position = scale.position(hz, 11_025.0);
                assert_abs_diff_eq!(scale.frequency(position, 11_025.0), hz, epsilon = 0.05);
            }
        }
    }

    #[test]
    fn log_axis_gives_octaves_equal_height() {
        let scale = FrequencyScale::Log;
        let a = scale.position(440.0, 11_025.0) - scale.position(220.0, 11_025.0);
        let b = scale.position(1760.0, 11_025.0) - scale.position(880.0, 11_025.0);
        assert_abs_diff_eq!(a, b, epsilon = 1e-5);
    }

    #[test]
    fn log_ticks_are_octaves() {
        let ticks = FrequencyScale::Log.ticks(11_025.0);
        assert_eq!(ticks.first(), Some(&0.0));
        assert_eq!(ticks[1], 64.0);
        assert_eq!(ticks.last(), Some(&8192.0));
    }

    #[test]
    fn db_values_peak_at_zero() {
        let spectrogram = DbSpectrogram::compute(&sine(440.0, 1.0), &SpectrogramConfig::default()).unwrap();
        let range = spectrogram.db_range();
        assert_abs_diff_eq!(*range.end(), 0.0, epsilon = 1e-4);
        assert!(*range.start() >= -80.0 - 1e-3);
        assert_eq!(spectrogram.bins(), 1025);
    }

    #[test]
    fn tone_row_is_brightest() {
        let spectrogram = DbSpectrogram::compute(&sine(2000.0, 1.0), &SpectrogramConfig::default()).unwrap();
        let config = RenderConfig {
            height: 128,
            ..Default::default()
        };
        let rendered = spectrogram.render(FrequencyScale::Linear, &config);
        assert_eq!(rendered.height(), 128);
        assert_eq!(rendered.width(), spectrogram.frames());

        let column = rendered.width() / 2;
        let luma = |row: usize| {
            let c = rendered.image.pixels[row * rendered.width() + column];
            c.r() as u32 + c.g() as u32 + c.b() as u32
        };
        let brightest = (0..rendered.height()).max_by_key(|&row| luma(row)).unwrap();
        let position = 1.0 - (brightest as f32 + 0.5) / 128.0;
        let hz = FrequencyScale::Linear.frequency(position, spectrogram.nyquist());
        let bin_hz = fft_frequencies(SR, 2048)[1];
        assert!((hz - 2000.0).abs() < 11_025.0 / 128.0 + bin_hz, "{hz}");
    }

    #[test]
    fn long_signals_are_pooled_to_max_width() {
        let spectrogram = DbSpectrogram::compute(&sine(440.0, 3.0), &SpectrogramConfig::default()).unwrap();
        let config = RenderConfig {
            height: 32,
            max_width: 50,
            ..Default::default()
        };
        let rendered = spectrogram.render(FrequencyScale::Log, &config);
        assert_eq!(rendered.image.size, [50, 32]);
        assert_eq!(rendered.image.pixels.len(), 50 * 32);
        assert_abs_diff_eq!(rendered.duration_seconds, 3.0, epsilon = 1e-3);
    }
}
