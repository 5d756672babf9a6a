use serde::{Deserialize, Serialize};

use crate::AnalysisError;

/// Smallest buffer the analyzer accepts; one full STFT frame.
pub const MIN_ANALYSIS_SAMPLES: usize = 2048;

/// Mono audio held by an analysis session.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct AudioSignal {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSignal {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Result<Self, AnalysisError> {
        if sample_rate == 0 {
            return Err(AnalysisError::validation("sample rate must be positive"));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Checks the minimum-length guard. The boundary is inclusive.
    pub fn ensure_analyzable(&self) -> Result<(), AnalysisError> {
        if self.samples.len() < MIN_ANALYSIS_SAMPLES {
            return Err(AnalysisError::SignalTooShort {
                samples: self.samples.len(),
                minimum: MIN_ANALYSIS_SAMPLES,
            });
        }
        Ok(())
    }
}
