use std::path::{Path, PathBuf};

use bpmscope_audio::{load_signal, LoaderConfig};
use bpmscope_domain::{AnalysisError, AudioSignal, SegmentResult, TempoLog};
use tracing::{info, instrument};

use crate::pipeline::SegmentTempoEstimator;

/// Loaded audio and the results of the latest analysis run.
///
/// Loading a new signal discards previous results; a failed load keeps the
/// current state.
pub struct AnalysisSession {
    loader: LoaderConfig,
    estimator: SegmentTempoEstimator,
    source: Option<PathBuf>,
    signal: Option<AudioSignal>,
    results: Option<Vec<SegmentResult>>,
}

impl AnalysisSession {
    pub fn new(loader: LoaderConfig, estimator: SegmentTempoEstimator) -> Self {
        Self {
            loader,
            estimator,
            source: None,
            signal: None,
            results: None,
        }
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn signal(&self) -> Option<&AudioSignal> {
        self.signal.as_ref()
    }

    pub fn results(&self) -> Option<&[SegmentResult]> {
        self.results.as_deref()
    }

    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<&AudioSignal, AnalysisError> {
        let signal = load_signal(path.as_ref(), &self.loader)?;
        self.source = Some(path.as_ref().to_path_buf());
        Ok(self.replace_signal(signal))
    }

    pub fn set_signal(&mut self, signal: AudioSignal) -> &AudioSignal {
        self.source = None;
        self.replace_signal(signal)
    }

    fn replace_signal(&mut self, signal: AudioSignal) -> &AudioSignal {
        self.results = None;
        self.signal.insert(signal)
    }

    /// Estimates tempo for every segment of the loaded signal.
    pub fn analyze(&mut self) -> Result<&[SegmentResult], AnalysisError> {
        let signal = self.signal.as_ref().ok_or(AnalysisError::NoSignal)?;
        signal.ensure_analyzable()?;
        self.results = None;
        let results = self.estimator.estimate(signal)?;
        info!(segments = results.len(), "analysis finished");
        let stored = self.results.insert(results);
        Ok(stored.as_slice())
    }

    pub fn tempo_log(&self) -> Result<TempoLog, AnalysisError> {
        let results = self.results.as_ref().ok_or(AnalysisError::NotAnalyzed)?;
        TempoLog::new(results.clone())
    }

    pub fn log_lines(&self) -> Result<Vec<String>, AnalysisError> {
        Ok(self.tempo_log()?.lines())
    }
}

impl Default for AnalysisSession {
    fn default() -> Self {
        Self::new(LoaderConfig::default(), SegmentTempoEstimator::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::EstimatorConfig;
    use bpmscope_audio::FixedTempoTracker;
    use bpmscope_domain::MIN_ANALYSIS_SAMPLES;

    fn session(bpm: f32) -> AnalysisSession {
        AnalysisSession::new(
            LoaderConfig::default(),
            SegmentTempoEstimator::with_tracker(
                EstimatorConfig::default(),
                Box::new(FixedTempoTracker { bpm }),
            ),
        )
    }

    fn tone(samples: usize, sample_rate: u32) -> AudioSignal {
        let data = (0..samples).map(|i| (i as f32 * 0.05).sin()).collect();
        AudioSignal::new(data, sample_rate).unwrap()
    }

    #[test]
    fn analyze_requires_a_signal() {
        let mut session = session(120.0);
        assert!(matches!(session.analyze(), Err(AnalysisError::NoSignal)));
    }

    #[test]
    fn log_requires_analysis() {
        let mut session = session(120.0);
        session.set_signal(tone(22_050 * 12, 22_050));
        let err = session.log_lines().unwrap_err();
        assert_eq!(err.to_string(), "Please analyze BPM before viewing the log.");
    }

    #[test]
    fn short_signal_is_rejected_before_estimation() {
        let mut session = session(120.0);
        session.set_signal(tone(MIN_ANALYSIS_SAMPLES - 1, 22_050));
        assert!(matches!(
            session.analyze(),
            Err(AnalysisError::SignalTooShort { .. })
        ));
    }

    #[test]
    fn minimum_length_passes_the_guard() {
        let mut session = session_with_segment(120.0, MIN_ANALYSIS_SAMPLES as f64 / 8000.0);
        session.set_signal(tone(MIN_ANALYSIS_SAMPLES, 8000));
        assert_eq!(session.analyze().unwrap().len(), 1);
    }

    fn session_with_segment(bpm: f32, segment: f64) -> AnalysisSession {
        AnalysisSession::new(
            LoaderConfig::default(),
            SegmentTempoEstimator::with_tracker(
                EstimatorConfig {
                    segment_duration_seconds: segment,
                    ..Default::default()
                },
                Box::new(FixedTempoTracker { bpm }),
            ),
        )
    }

    #[test]
    fn analysis_produces_log_lines() {
        let mut session = session(120.0);
        session.set_signal(tone(22_050 * 25, 22_050));
        assert_eq!(session.analyze().unwrap().len(), 3);
        let lines = session.log_lines().unwrap();
        assert_eq!(
            lines,
            vec![
                "Segment 1: Start Time = 0.00s, Estimated BPM = 120.00",
                "Segment 2: Start Time = 10.00s, Estimated BPM = 120.00",
                "Segment 3: Start Time = 20.00s, Estimated BPM = 120.00",
            ]
        );
    }

    #[test]
    fn new_signal_discards_results() {
        let mut session = session(120.0);
        session.set_signal(tone(22_050 * 12, 22_050));
        session.analyze().unwrap();
        assert!(session.results().is_some());
        session.set_signal(tone(22_050 * 12, 22_050));
        assert!(session.results().is_none());
    }

    #[test]
    fn failed_load_keeps_current_signal() {
        let mut session = session(120.0);
        session.set_signal(tone(22_050 * 12, 22_050));
        session.analyze().unwrap();
        assert!(session.load("missing.wav").is_err());
        assert!(session.signal().is_some());
        assert!(session.results().is_some());
    }
}
