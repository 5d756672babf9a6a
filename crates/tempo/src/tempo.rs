//! Onset-envelope tempo estimation and dynamic-programming beat tracking.
//!
//! The pipeline is: mel power spectrogram, log-power spectral flux averaged
//! over bands, an autocorrelation tempogram weighted by a log-normal tempo
//! prior, and a beat sequence that maximises onset strength while keeping
//! inter-beat intervals close to the estimated period.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bpmscope_audio::spectrum::{power_to_db, MelFilterbank, Stft};
use bpmscope_audio::{BeatTrack, BeatTracker};
use ndarray::{Array2, Axis};
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackerConfig {
    pub n_fft: usize,
    pub hop_length: usize,
    pub n_mels: usize,
    /// Autocorrelation window of the tempogram, in onset frames.
    pub tempogram_window: usize,
    /// Centre of the tempo prior.
    pub start_bpm: f32,
    /// Width of the tempo prior, in octaves.
    pub std_bpm: f32,
    pub max_tempo: f32,
    /// How strictly beats follow the estimated period.
    pub tightness: f32,
    /// Drop weak beats at the start and end of the sequence.
    pub trim: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            // eight seconds of onset frames at 22050 Hz
            tempogram_window: 344,
            start_bpm: 120.0,
            std_bpm: 1.0,
            max_tempo: 320.0,
            tightness: 100.0,
            trim: true,
        }
    }
}

pub struct OnsetTempoTracker {
    config: TrackerConfig,
    stft: Stft,
    acf_forward: Arc<dyn RealToComplex<f32>>,
    acf_inverse: Arc<dyn ComplexToReal<f32>>,
}

impl OnsetTempoTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let fft_len = (config.tempogram_window * 2).next_power_of_two();
        let mut planner = RealFftPlanner::<f32>::new();
        Self {
            stft: Stft::new(config.n_fft, config.hop_length),
            acf_forward: planner.plan_fft_forward(fft_len),
            acf_inverse: planner.plan_fft_inverse(fft_len),
            config,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Spectral-flux onset strength, one value per STFT frame.
    pub fn onset_strength(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
        let power = self.stft.power(samples)?;
        let mel = MelFilterbank::new(sample_rate, self.config.n_fft, self.config.n_mels, 0.0, None)
            .apply(&power);
        let db = power_to_db(&mel, 1.0, Some(80.0));
        let frames = db.ncols();

        let mut flux = Vec::with_capacity(frames);
        for t in 1..frames {
            let rise: f32 = db
                .column(t)
                .iter()
                .zip(db.column(t - 1).iter())
                .map(|(cur, prev)| (cur - prev).max(0.0))
                .sum();
            flux.push(rise / db.nrows().max(1) as f32);
        }

        // shift by the lag plus the centering offset so peaks line up with frames
        let shift = 1 + self.config.n_fft / (2 * self.config.hop_length);
        let mut envelope = vec![0.0; shift];
        envelope.extend(flux);
        envelope.truncate(frames);
        Ok(envelope)
    }

    /// Autocorrelation tempogram with shape `(lags, frames)`.
    ///
    /// The envelope is linearly ramped to zero on both sides before framing;
    /// each column is normalised by its largest value.
    pub fn tempogram(&self, onset_envelope: &[f32]) -> Result<Array2<f32>> {
        let win = self.config.tempogram_window;
        if win == 0 {
            bail!("tempogram window must be positive");
        }
        let padded = linear_ramp_pad(onset_envelope, win / 2);
        let frames = (padded.len() + 1).saturating_sub(win);
        let window = periodic_hann(win);

        let mut input = self.acf_forward.make_input_vec();
        let mut spectrum = self.acf_forward.make_output_vec();
        let mut lags = self.acf_inverse.make_output_vec();
        let mut out = Array2::<f32>::zeros((win, frames));

        for frame in 0..frames {
            input.fill(0.0);
            for (i, (slot, w)) in input.iter_mut().zip(window.iter()).enumerate() {
                *slot = padded[frame + i] * w;
            }
            self.acf_forward
                .process(&mut input, &mut spectrum)
                .context("tempogram forward fft")?;
            for c in spectrum.iter_mut() {
                *c = Complex::new(c.norm_sqr(), 0.0);
            }
            self.acf_inverse
                .process(&mut spectrum, &mut lags)
                .context("tempogram inverse fft")?;

            let peak = lags[..win].iter().fold(0.0_f32, |acc, v| acc.max(v.abs()));
            if peak <= f32::MIN_POSITIVE {
                continue;
            }
            for (lag, value) in lags[..win].iter().enumerate() {
                out[[lag, frame]] = value / peak;
            }
        }
        Ok(out)
    }

    /// BPM corresponding to every tempogram lag; lag zero is infinite.
    pub fn tempo_frequencies(&self, sample_rate: u32) -> Vec<f32> {
        let frame_rate = sample_rate as f32 / self.config.hop_length as f32;
        (0..self.config.tempogram_window)
            .map(|lag| {
                if lag == 0 {
                    f32::INFINITY
                } else {
                    60.0 * frame_rate / lag as f32
                }
            })
            .collect()
    }

    /// Global tempo from the time-averaged tempogram and the tempo prior.
    pub fn estimate_tempo(&self, onset_envelope: &[f32], sample_rate: u32) -> Result<f32> {
        let tempogram = self.tempogram(onset_envelope)?;
        let Some(mean) = tempogram.mean_axis(Axis(1)) else {
            return Ok(0.0);
        };
        let bpms = self.tempo_frequencies(sample_rate);
        let start = self.config.start_bpm.log2();
        let std = self.config.std_bpm.max(f32::EPSILON);

        let best = bpms
            .iter()
            .zip(mean.iter())
            .filter(|(bpm, _)| **bpm < self.config.max_tempo)
            .map(|(bpm, strength)| {
                let prior = -0.5 * ((bpm.log2() - start) / std).powi(2);
                (*bpm, (1.0 + 1e6 * strength.max(0.0)).ln() + prior)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1));
        Ok(best.map(|(bpm, _)| bpm).unwrap_or(0.0))
    }

    /// Beat frames for a known tempo.
    pub fn track_beats(&self, onset_envelope: &[f32], bpm: f32, sample_rate: u32) -> Result<Vec<usize>> {
        if bpm <= 0.0 || !bpm.is_finite() {
            bail!("tempo must be positive, got {bpm}");
        }
        let frame_rate = sample_rate as f32 / self.config.hop_length as f32;
        let period = (frame_rate * 60.0 / bpm).round().max(1.0);

        let local = local_score(&normalize_onsets(onset_envelope), period);
        let (backlink, cumulative) = beat_dp(&local, period, self.config.tightness);
        let Some(tail) = last_beat(&cumulative) else {
            return Ok(Vec::new());
        };

        let mut beats = Vec::new();
        let mut cursor = tail as isize;
        while cursor >= 0 {
            beats.push(cursor as usize);
            cursor = backlink[cursor as usize];
        }
        beats.reverse();

        if self.config.trim {
            beats = trim_beats(&local, beats);
        }
        Ok(beats)
    }
}

impl Default for OnsetTempoTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl BeatTracker for OnsetTempoTracker {
    fn track(&self, samples: &[f32], sample_rate: u32) -> Result<BeatTrack> {
        debug!(sample_rate, sample_count = samples.len(), "tracking beats");
        let envelope = self.onset_strength(samples, sample_rate)?;
        if envelope.iter().all(|v| *v == 0.0) {
            return Ok(BeatTrack::silent(self.config.hop_length));
        }
        let tempo_bpm = self.estimate_tempo(&envelope, sample_rate)?;
        if tempo_bpm <= 0.0 {
            return Ok(BeatTrack::silent(self.config.hop_length));
        }
        let beats = self.track_beats(&envelope, tempo_bpm, sample_rate)?;
        debug!(tempo_bpm, beats = beats.len(), "beat track complete");
        Ok(BeatTrack {
            tempo_bpm,
            beats,
            hop_length: self.config.hop_length,
        })
    }
}

fn periodic_hann(len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / len as f32).cos())
        .collect()
}

/// Pads with ramps that fall linearly from the edge values to zero.
fn linear_ramp_pad(values: &[f32], width: usize) -> Vec<f32> {
    let first = values.first().copied().unwrap_or(0.0);
    let last = values.last().copied().unwrap_or(0.0);
    let mut padded = Vec::with_capacity(values.len() + 2 * width);
    padded.extend((0..width).map(|j| first * j as f32 / width as f32));
    padded.extend_from_slice(values);
    padded.extend((0..width).map(|j| last * (1.0 - (j + 1) as f32 / width as f32)));
    padded
}

/// Scales onsets to unit sample standard deviation.
fn normalize_onsets(onsets: &[f32]) -> Vec<f32> {
    let n = onsets.len();
    if n < 2 {
        return onsets.to_vec();
    }
    let mean = onsets.iter().sum::<f32>() / n as f32;
    let var = onsets.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / (n - 1) as f32;
    let std = var.sqrt() + f32::MIN_POSITIVE;
    onsets.iter().map(|v| v / std).collect()
}

/// Onsets smoothed by a Gaussian scaled to the beat period ("same" convolution).
fn local_score(onsets: &[f32], period: f32) -> Vec<f32> {
    let half = period as isize;
    let kernel: Vec<f32> = (-half..=half)
        .map(|k| (-0.5 * (k as f32 * 32.0 / period).powi(2)).exp())
        .collect();
    let n = onsets.len() as isize;
    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(j, w)| {
                    let src = i + half - j as isize;
                    (src >= 0 && src < n).then(|| onsets[src as usize] * w)
                })
                .sum()
        })
        .collect()
}

fn beat_dp(local: &[f32], period: f32, tightness: f32) -> (Vec<isize>, Vec<f32>) {
    let n = local.len();
    let mut backlink = vec![-1_isize; n];
    let mut cumulative = vec![0.0_f32; n];
    let threshold = 0.01 * local.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let nearest = (period / 2.0).round() as isize;
    let farthest = (2.0 * period) as isize;
    let log_period = period.ln();
    let mut first_beat = true;

    for (i, &score) in local.iter().enumerate() {
        let i_signed = i as isize;
        let mut best: Option<(isize, f32)> = None;
        let mut loc = i_signed - nearest;
        while loc >= i_signed - farthest && loc >= 0 {
            let offset = (i_signed - loc) as f32;
            let candidate =
                cumulative[loc as usize] - tightness * (offset.ln() - log_period).powi(2);
            if best.map_or(true, |(_, s)| candidate > s) {
                best = Some((loc, candidate));
            }
            loc -= 1;
        }

        cumulative[i] = score + best.map_or(0.0, |(_, s)| s);
        if first_beat && score < threshold {
            backlink[i] = -1;
        } else {
            backlink[i] = best.map_or(-1, |(loc, _)| loc);
            first_beat = false;
        }
    }
    (backlink, cumulative)
}

/// Last local maximum of the cumulative score above half the median peak.
fn last_beat(cumulative: &[f32]) -> Option<usize> {
    let n = cumulative.len();
    if n == 0 {
        return None;
    }
    let is_peak = |i: usize| {
        let left = if i == 0 { cumulative[0] } else { cumulative[i - 1] };
        let right = if i + 1 == n { cumulative[i] } else { cumulative[i + 1] };
        cumulative[i] > left && cumulative[i] >= right
    };
    let mut peaks: Vec<f32> = (0..n).filter(|&i| is_peak(i)).map(|i| cumulative[i]).collect();
    if peaks.is_empty() {
        return Some(n - 1);
    }
    peaks.sort_by(f32::total_cmp);
    let mid = peaks.len() / 2;
    let median = if peaks.len() % 2 == 0 {
        0.5 * (peaks[mid - 1] + peaks[mid])
    } else {
        peaks[mid]
    };
    (0..n)
        .rev()
        .find(|&i| is_peak(i) && cumulative[i] * 2.0 > median)
        .or(Some(n - 1))
}

/// Drops beats whose smoothed local score falls below half its RMS.
fn trim_beats(local: &[f32], beats: Vec<usize>) -> Vec<usize> {
    if beats.is_empty() {
        return beats;
    }
    let hann = periodic_hann(5);
    let strengths: Vec<f32> = beats.iter().map(|&b| local[b]).collect();
    let n = strengths.len() as isize;
    let smooth: Vec<f32> = (0..n)
        .map(|i| {
            hann
                .iter()
                .enumerate()
                .filter_map(|(j, w)| {
                    let src = i + 2 - j as isize;
                    (src >= 0 && src < n).then(|| strengths[src as usize] * w)
                })
                .sum()
        })
        .collect();
    let rms = (smooth.iter().map(|v| v * v).sum::<f32>() / smooth.len() as f32).sqrt();
    let threshold = 0.5 * rms;

    let first = smooth.iter().position(|v| *v > threshold);
    let last = smooth.iter().rposition(|v| *v > threshold);
    match (first, last) {
        (Some(first), Some(last)) => beats[first..last].to_vec(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 22_050;

    /// Decaying 1 kHz clicks at a fixed tempo.
    fn click_track(bpm: f32, seconds: f32) -> Vec<f32> {
        let total = (SR as f32 * seconds) as usize;
        let mut samples = vec![0.0f32; total];
        let spacing = 60.0 / bpm * SR as f32;
        let click = (SR as f32 * 0.02) as usize;
        let mut position = 0.0f32;
        while (position as usize) < total {
            let start = position as usize;
            for j in 0..click {
                if let Some(sample) = samples.get_mut(start + j) {
                    let t = j as f32 / SR as f32;
                    *sample = (2.0 * std::f32::consts::PI * 1000.0 * t).sin() * (-t * 200.0).exp();
                }
            }
            position += spacing;
        }
        samples
    }

    #[test]
    fn onset_envelope_has_one_value_per_frame() {
        let tracker = OnsetTempoTracker::default();
        let samples = click_track(120.0, 4.0);
        let envelope = tracker.onset_strength(&samples, SR).unwrap();
        assert_eq!(envelope.len(), 1 + samples.len() / 512);
        assert!(envelope[..3].iter().all(|v| *v == 0.0));
        assert!(envelope.iter().any(|v| *v > 0.0));
    }

    #[test]
    fn tempogram_columns_are_normalised() {
        let tracker = OnsetTempoTracker::default();
        let envelope = tracker.onset_strength(&click_track(120.0, 6.0), SR).unwrap();
        let tempogram = tracker.tempogram(&envelope).unwrap();
        assert_eq!(tempogram.nrows(), tracker.config().tempogram_window);
        assert_eq!(tempogram.nrows(), 344);
        assert_eq!(tempogram.ncols(), envelope.len() + 1);
        let column = tempogram.column(tempogram.ncols() / 2);
        assert!((column[0] - 1.0).abs() < 1e-4);
    }

    #[test]
    fn tempo_frequencies_follow_frame_rate() {
        let tracker = OnsetTempoTracker::default();
        let bpms = tracker.tempo_frequencies(SR);
        assert!(bpms[0].is_infinite());
        assert!((bpms[21] - 123.046875).abs() < 1e-3);
    }

    #[test]
    fn recovers_click_track_tempo() {
        let tracker = OnsetTempoTracker::default();
        let track = tracker.track(&click_track(120.0, 10.0), SR).unwrap();
        assert!((track.tempo_bpm - 120.0).abs() < 6.0, "tempo {}", track.tempo_bpm);
        assert!(track.beats.len() >= 12, "beats {:?}", track.beats);
        for pair in track.beats.windows(2) {
            let gap = (pair[1] - pair[0]) as f32;
            assert!((18.0..=26.0).contains(&gap), "gap {gap}");
        }
    }

    #[test]
    fn silence_has_no_tempo() {
        let tracker = OnsetTempoTracker::default();
        let track = tracker.track(&vec![0.0; SR as usize * 3], SR).unwrap();
        assert_eq!(track.tempo_bpm, 0.0);
        assert!(track.beats.is_empty());
        assert_eq!(tracker.track(&[], SR).unwrap().tempo_bpm, 0.0);
    }

    #[test]
    fn tracking_is_deterministic() {
        let tracker = OnsetTempoTracker::default();
        let samples = click_track(100.0, 8.0);
        assert_eq!(tracker.track(&samples, SR).unwrap(), tracker.track(&samples, SR).unwrap());
    }

    #[test]
    fn rejects_non_positive_tempo_for_beats() {
        let tracker = OnsetTempoTracker::default();
        assert!(tracker.track_beats(&[0.0, 1.0, 0.0], 0.0, SR).is_err());
    }

    #[test]
    fn beat_smoothing_window_is_periodic() {
        let hann = periodic_hann(5);
        let expected = [0.0, 0.345_491, 0.904_508, 0.904_508, 0.345_491];
        for (value, want) in hann.iter().zip(expected) {
            assert!((value - want).abs() < 1e-5, "{hann:?}");
        }
    }

    #[test]
    fn weak_edge_beats_are_trimmed() {
        let mut local = vec![0.0f32; 200];
        for beat in (20..=180).step_by(20) {
            local[beat] = if beat == 20 || beat == 180 { 0.05 } else { 1.0 };
        }
        let beats: Vec<usize> = (20..=180).step_by(20).collect();
        let kept = trim_beats(&local, beats);
        assert!(!kept.contains(&20), "{kept:?}");
        assert!(kept.contains(&100));
    }

    #[test]
    fn ramp_padding_falls_to_zero() {
        let padded = linear_ramp_pad(&[4.0, 2.0], 2);
        assert_eq!(padded, vec![0.0, 2.0, 4.0, 2.0, 1.0, 0.0]);
    }
}
