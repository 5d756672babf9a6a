use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("failed to load audio from {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("audio signal is too short for analysis: {samples} samples, need at least {minimum}")]
    SignalTooShort { samples: usize, minimum: usize },
    #[error(
        "audio signal is too short for analysis: {duration_seconds:.2}s is shorter than one {segment_seconds:.2}s segment"
    )]
    TooShort {
        duration_seconds: f64,
        segment_seconds: f64,
    },
    #[error("tempo estimation failed: {0}")]
    Estimation(String),
    #[error("no audio file selected")]
    NoSignal,
    #[error("Please analyze BPM before viewing the log.")]
    NotAnalyzed,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AnalysisError {
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    pub fn load<P: Into<String>, R: Into<String>>(path: P, reason: R) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Errors that stem from the input audio rather than from a failure inside
    /// the analysis itself.
    pub fn is_too_short(&self) -> bool {
        matches!(self, Self::SignalTooShort { .. } | Self::TooShort { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_short_messages_are_user_facing() {
        let err = AnalysisError::TooShort {
            duration_seconds: 5.0,
            segment_seconds: 10.0,
        };
        assert!(err.is_too_short());
        assert_eq!(
            err.to_string(),
            "audio signal is too short for analysis: 5.00s is shorter than one 10.00s segment"
        );
        assert!(!AnalysisError::NoSignal.is_too_short());
    }
}
