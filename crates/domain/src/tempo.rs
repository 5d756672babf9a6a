use serde::{Deserialize, Serialize};

use crate::{AnalysisError, SegmentBounds};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SegmentResult {
    /// Zero-based position of the segment in the signal.
    pub index: usize,
    /// Seconds from the start of the signal.
    pub start_time_seconds: f64,
    pub end_time_seconds: f64,
    /// Beats per minute; zero when the segment has no detectable pulse.
    pub estimated_bpm: f32,
}

impl SegmentResult {
    pub fn new(bounds: &SegmentBounds, estimated_bpm: f32) -> Result<Self, AnalysisError> {
        if !estimated_bpm.is_finite() || estimated_bpm < 0.0 {
            return Err(AnalysisError::Estimation(format!(
                "segment {} produced an invalid tempo {estimated_bpm}",
                bounds.index + 1
            )));
        }
        Ok(Self {
            index: bounds.index,
            start_time_seconds: bounds.start_time_seconds,
            end_time_seconds: bounds.end_time_seconds,
            estimated_bpm,
        })
    }

    /// One line of the textual log, numbered from one.
    pub fn log_line(&self) -> String {
        format!(
            "Segment {}: Start Time = {:.2}s, Estimated BPM = {:.2}",
            self.index + 1,
            self.start_time_seconds,
            self.estimated_bpm
        )
    }
}

/// Chronological per-segment tempo estimates of one analysis run.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct TempoLog {
    pub(crate) segments: Vec<SegmentResult>,
}

impl TempoLog {
    pub fn new(segments: Vec<SegmentResult>) -> Result<Self, AnalysisError> {
        let ordered = segments
            .windows(2)
            .all(|pair| pair[0].start_time_seconds < pair[1].start_time_seconds);
        if !ordered {
            return Err(AnalysisError::validation(
                "segment start times must be strictly increasing",
            ));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[SegmentResult] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn bpm_at(&self, time: f64) -> Option<f32> {
        let mut current = None;
        for segment in &self.segments {
            if segment.start_time_seconds <= time {
                current = Some(segment.estimated_bpm);
            } else {
                break;
            }
        }
        current
    }

    /// Mean of the non-zero segment tempos.
    pub fn mean_bpm(&self) -> Option<f32> {
        let detected: Vec<f32> = self
            .segments
            .iter()
            .map(|s| s.estimated_bpm)
            .filter(|bpm| *bpm > 0.0)
            .collect();
        if detected.is_empty() {
            return None;
        }
        Some(detected.iter().sum::<f32>() / detected.len() as f32)
    }

    pub fn lines(&self) -> Vec<String> {
        self.segments.iter().map(SegmentResult::log_line).collect()
    }
}
