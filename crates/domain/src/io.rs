use serde::{Deserialize, Serialize};

use crate::{error::AnalysisError, tempo::TempoLog};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExportFormat {
    Text,
    Json,
}

pub trait LogExporter {
    fn export(&self, log: &TempoLog, format: ExportFormat) -> Result<Vec<u8>, AnalysisError>;
}

pub struct TextExporter;

impl LogExporter for TextExporter {
    fn export(&self, log: &TempoLog, format: ExportFormat) -> Result<Vec<u8>, AnalysisError> {
        match format {
            ExportFormat::Text => {
                let mut text = String::new();
                for line in log.lines() {
                    text.push_str(&line);
                    text.push('\n');
                }
                Ok(text.into_bytes())
            }
            other => Err(AnalysisError::validation(format!(
                "TextExporter cannot handle {:?}",
                other
            ))),
        }
    }
}

pub struct JsonExporter;

impl LogExporter for JsonExporter {
    fn export(&self, log: &TempoLog, format: ExportFormat) -> Result<Vec<u8>, AnalysisError> {
        match format {
            ExportFormat::Json => serde_json::to_vec_pretty(log.segments())
                .map_err(|err| AnalysisError::Serialization(err.to_string())),
            other => Err(AnalysisError::validation(format!(
                "JsonExporter cannot handle {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SegmentBounds, SegmentResult};

    fn log() -> TempoLog {
        let bounds = SegmentBounds {
            index: 0,
            start_time_seconds: 0.0,
            end_time_seconds: 10.0,
            start_sample: 0,
            end_sample: 220_500,
        };
        TempoLog::new(vec![SegmentResult::new(&bounds, 120.0).unwrap()]).unwrap()
    }

    #[test]
    fn exports_text_lines() {
        let bytes = TextExporter.export(&log(), ExportFormat::Text).unwrap();
        let output = String::from_utf8(bytes).unwrap();
        assert_eq!(output, "Segment 1: Start Time = 0.00s, Estimated BPM = 120.00\n");
    }

    #[test]
    fn exports_json() {
        let bytes = JsonExporter.export(&log(), ExportFormat::Json).unwrap();
        let output = String::from_utf8(bytes).unwrap();
        assert!(output.contains("\"estimated_bpm\": 120.0"));
        assert!(JsonExporter.export(&log(), ExportFormat::Text).is_err());
    }
}
