use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::spectrum::frames_to_time;

/// Tempo and beat positions found in one buffer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BeatTrack {
    /// Global tempo of the buffer; zero when no pulse was found.
    pub tempo_bpm: f32,
    /// Beat positions as onset-envelope frame indices.
    pub beats: Vec<usize>,
    pub hop_length: usize,
}

impl BeatTrack {
    pub fn silent(hop_length: usize) -> Self {
        Self {
            tempo_bpm: 0.0,
            beats: Vec::new(),
            hop_length,
        }
    }

    pub fn beat_times(&self, sample_rate: u32) -> Vec<f64> {
        self.beats
            .iter()
            .map(|&frame| frames_to_time(frame, sample_rate, self.hop_length))
            .collect()
    }
}

/// Estimates the tempo of a mono buffer.
pub trait BeatTracker {
    fn track(&self, samples: &[f32], sample_rate: u32) -> Result<BeatTrack>;
}

/// Reports the same tempo for every non-empty buffer.
pub struct FixedTempoTracker {
    pub bpm: f32,
}

impl BeatTracker for FixedTempoTracker {
    fn track(&self, samples: &[f32], _sample_rate: u32) -> Result<BeatTrack> {
        if samples.is_empty() {
            return Ok(BeatTrack::silent(512));
        }
        Ok(BeatTrack {
            tempo_bpm: self.bpm,
            beats: Vec::new(),
            hop_length: 512,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_tracker_returns_configured_tempo() {
        let tracker = FixedTempoTracker { bpm: 128.0 };
        let output = tracker.track(&[0.2, 0.3, 0.4], 22_050).unwrap();
        assert_eq!(output.tempo_bpm, 128.0);
        assert_eq!(tracker.track(&[], 22_050).unwrap().tempo_bpm, 0.0);
    }

    #[test]
    fn beat_frames_convert_to_seconds() {
        let track = BeatTrack {
            tempo_bpm: 120.0,
            beats: vec![0, 43, 86],
            hop_length: 512,
        };
        let times = track.beat_times(22_050);
        assert!((times[1] - 0.998).abs() < 1e-3);
    }
}
