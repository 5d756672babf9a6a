pub mod error;
pub mod io;
pub mod segment;
pub mod signal;
pub mod tempo;

pub use crate::error::AnalysisError;
pub use crate::io::{ExportFormat, JsonExporter, LogExporter, TextExporter};
pub use crate::segment::{SegmentBounds, SegmentPlan, ShortAudioPolicy};
pub use crate::signal::{AudioSignal, MIN_ANALYSIS_SAMPLES};
pub use crate::tempo::{SegmentResult, TempoLog};
