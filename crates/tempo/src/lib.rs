pub mod pipeline;
pub mod session;
pub mod tempo;

pub use pipeline::{EstimatorConfig, SegmentTempoEstimator, DEFAULT_SEGMENT_SECONDS};
pub use session::AnalysisSession;
pub use tempo::{OnsetTempoTracker, TrackerConfig};
