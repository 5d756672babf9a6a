use bpmscope_audio::dsp::trimmed;
use bpmscope_audio::{BeatTracker, TrimConfig};
use bpmscope_domain::{AnalysisError, AudioSignal, SegmentPlan, SegmentResult, ShortAudioPolicy};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::tempo::OnsetTempoTracker;

pub const DEFAULT_SEGMENT_SECONDS: f64 = 10.0;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct EstimatorConfig {
    pub segment_duration_seconds: f64,
    pub trim: TrimConfig,
    pub short_audio: ShortAudioPolicy,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            segment_duration_seconds: DEFAULT_SEGMENT_SECONDS,
            trim: TrimConfig::default(),
            short_audio: ShortAudioPolicy::Reject,
        }
    }
}

/// Splits a signal into fixed windows and estimates one tempo per window.
pub struct SegmentTempoEstimator {
    config: EstimatorConfig,
    tracker: Box<dyn BeatTracker>,
}

impl SegmentTempoEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self::with_tracker(config, Box::new(OnsetTempoTracker::default()))
    }

    pub fn with_tracker(config: EstimatorConfig, tracker: Box<dyn BeatTracker>) -> Self {
        Self { config, tracker }
    }

    pub fn plan(&self, signal: &AudioSignal) -> Result<SegmentPlan, AnalysisError> {
        SegmentPlan::new(
            signal.len(),
            signal.sample_rate(),
            self.config.segment_duration_seconds,
            self.config.short_audio,
        )
    }

    /// Runs the tracker over every segment in chronological order.
    ///
    /// Tracker failures abort the run and surface as
    /// [`AnalysisError::Estimation`].
    #[instrument(skip_all, fields(samples = signal.len(), sample_rate = signal.sample_rate()))]
    pub fn estimate(&self, signal: &AudioSignal) -> Result<Vec<SegmentResult>, AnalysisError> {
        let plan = self.plan(signal)?;
        info!(
            segments = plan.len(),
            segment_seconds = plan.segment_duration_seconds,
            "estimating tempo per segment"
        );

        let mut results = Vec::with_capacity(plan.len());
        for bounds in plan.segments() {
            let segment = &signal.samples()[bounds.sample_range()];
            let trimmed = trimmed(segment, &self.config.trim);
            let track = self
                .tracker
                .track(trimmed, signal.sample_rate())
                .map_err(|err| {
                    AnalysisError::Estimation(format!("segment {}: {err:#}", bounds.index + 1))
                })?;
            debug!(
                segment = bounds.index + 1,
                start = bounds.start_time_seconds,
                kept = trimmed.len(),
                tempo = track.tempo_bpm,
                beats = track.beats.len(),
                "segment analyzed"
            );
            results.push(SegmentResult::new(bounds, track.tempo_bpm)?);
        }
        Ok(results)
    }
}

impl Default for SegmentTempoEstimator {
    fn default() -> Self {
        Self::new(EstimatorConfig::default())
    }
}
