use bpmscope_audio::normalize_buffer;
use serde::{Deserialize, Serialize};

/// Extremes of one horizontal slice of the waveform, scaled to `[-1, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeBin {
    pub min: f32,
    pub max: f32,
}

/// Reduces `samples` to at most `bins` min/max pairs.
///
/// The result is normalised by the loudest sample so quiet files still fill
/// the view.
pub fn peak_envelope(samples: &[f32], bins: usize) -> Vec<EnvelopeBin> {
    if samples.is_empty() || bins == 0 {
        return Vec::new();
    }
    let window = samples.len().div_ceil(bins);
    // interleaved min/max pairs so one gain covers both extremes
    let mut extremes: Vec<f32> = samples
        .chunks(window)
        .flat_map(|chunk| {
            let (min, max) = chunk
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &s| (lo.min(s), hi.max(s)));
            [min, max]
        })
        .collect();
    normalize_buffer(&mut extremes);
    extremes
        .chunks_exact(2)
        .map(|pair| EnvelopeBin {
            min: pair[0].clamp(-1.0, 1.0),
            max: pair[1].clamp(-1.0, 1.0),
        })
        .collect()
}
