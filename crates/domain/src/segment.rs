use serde::{Deserialize, Serialize};

use crate::AnalysisError;

const COUNT_TOLERANCE: f64 = 1e-9;

/// What to do when the whole signal is shorter than one segment.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ShortAudioPolicy {
    /// Fail with [`AnalysisError::TooShort`].
    #[default]
    Reject,
    /// Analyze the whole signal as a single shortened segment.
    SingleSegment,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct SegmentBounds {
    pub index: usize,
    pub start_time_seconds: f64,
    pub end_time_seconds: f64,
    pub start_sample: usize,
    pub end_sample: usize,
}

impl SegmentBounds {
    pub fn duration_seconds(&self) -> f64 {
        self.end_time_seconds - self.start_time_seconds
    }

    pub fn sample_range(&self) -> std::ops::Range<usize> {
        self.start_sample..self.end_sample
    }
}

/// Fixed-length partition of a signal into analysis windows.
///
/// Sample boundaries are `trunc(time * sample_rate)`, so they match a plain
/// integer cast of the time value. The last window ends at the final sample
/// even when the float product lands just below it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SegmentPlan {
    pub total_duration_seconds: f64,
    pub segment_duration_seconds: f64,
    segments: Vec<SegmentBounds>,
}

impl SegmentPlan {
    pub fn new(
        sample_count: usize,
        sample_rate: u32,
        segment_duration_seconds: f64,
        policy: ShortAudioPolicy,
    ) -> Result<Self, AnalysisError> {
        if !segment_duration_seconds.is_finite() || segment_duration_seconds <= 0.0 {
            return Err(AnalysisError::validation(
                "segment duration must be a positive number of seconds",
            ));
        }
        if sample_rate == 0 {
            return Err(AnalysisError::validation("sample rate must be positive"));
        }

        let rate = sample_rate as f64;
        let total = sample_count as f64 / rate;
        let too_short = AnalysisError::TooShort {
            duration_seconds: total,
            segment_seconds: segment_duration_seconds,
        };
        if total < segment_duration_seconds {
            match policy {
                ShortAudioPolicy::SingleSegment if sample_count > 0 => {
                    return Ok(Self {
                        total_duration_seconds: total,
                        segment_duration_seconds,
                        segments: vec![SegmentBounds {
                            index: 0,
                            start_time_seconds: 0.0,
                            end_time_seconds: total,
                            start_sample: 0,
                            end_sample: sample_count,
                        }],
                    });
                }
                _ => return Err(too_short),
            }
        }

        // an exact multiple can divide to just above the integer
        let count = ((total / segment_duration_seconds) - COUNT_TOLERANCE).ceil().max(1.0) as usize;
        let segments = (0..count)
            .map(|index| {
                let start = index as f64 * segment_duration_seconds;
                let end = ((index + 1) as f64 * segment_duration_seconds).min(total);
                let start_sample = ((start * rate) as usize).min(sample_count);
                let end_sample = if end >= total {
                    sample_count
                } else {
                    ((end * rate) as usize).min(sample_count)
                };
                SegmentBounds {
                    index,
                    start_time_seconds: start,
                    end_time_seconds: end,
                    start_sample,
                    end_sample,
                }
            })
            .collect();

        Ok(Self {
            total_duration_seconds: total,
            segment_duration_seconds,
            segments,
        })
    }

    pub fn segments(&self) -> &[SegmentBounds] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const SR: u32 = 22_050;

    fn plan(seconds: f64, segment: f64) -> Result<SegmentPlan, AnalysisError> {
        SegmentPlan::new((seconds * SR as f64) as usize, SR, segment, ShortAudioPolicy::Reject)
    }

    #[test]
    fn twenty_five_seconds_in_ten_second_segments() {
        let plan = plan(25.0, 10.0).unwrap();
        let starts: Vec<f64> = plan.segments().iter().map(|s| s.start_time_seconds).collect();
        assert_eq!(starts, vec![0.0, 10.0, 20.0]);

        let last = plan.segments().last().unwrap();
        assert_relative_eq!(last.end_time_seconds, 25.0);
        assert_eq!(last.start_sample, 20 * SR as usize);
        assert_eq!(last.end_sample, 25 * SR as usize);
    }

    #[test]
    fn segment_count_is_ceiling_of_duration_ratio() {
        for (seconds, segment) in [(10.0, 10.0), (10.5, 10.0), (61.0, 7.5), (30.0, 10.0), (12.3, 4.0)] {
            let plan = plan(seconds, segment).unwrap();
            let expected = (plan.total_duration_seconds / segment).ceil() as usize;
            assert_eq!(plan.len(), expected, "{seconds}s / {segment}s");
        }
    }

    #[test]
    fn starts_increase_by_segment_duration() {
        let plan = plan(61.0, 7.5).unwrap();
        let segments = plan.segments();
        assert_eq!(segments[0].start_time_seconds, 0.0);
        for pair in segments.windows(2) {
            let gap = pair[1].start_time_seconds - pair[0].start_time_seconds;
            assert_relative_eq!(gap, 7.5);
            assert_eq!(pair[0].end_sample, pair[1].start_sample);
        }
        assert!(segments.last().unwrap().duration_seconds() <= 7.5);
    }

    #[test]
    fn boundaries_truncate_instead_of_rounding() {
        // 3.3337s at 1000 Hz is sample 3333.7
        let plan = SegmentPlan::new(10_000, 1000, 3.3337, ShortAudioPolicy::Reject).unwrap();
        let second = plan.segments()[1];
        assert_eq!(second.start_sample, 3333);
        assert_eq!(plan.segments().last().unwrap().end_sample, 10_000);
    }

    #[test]
    fn exact_multiple_does_not_add_a_sliver_segment() {
        // 2.1 / 0.7 divides to 3.0000000000000004
        let plan = SegmentPlan::new(2100, 1000, 0.7, ShortAudioPolicy::Reject).unwrap();
        assert_eq!(plan.len(), 3);
        let last = plan.segments().last().unwrap();
        assert_eq!(last.end_sample, 2100);
        assert!(last.end_sample - last.start_sample >= 699);

        let one_more = SegmentPlan::new(2101, 1000, 0.7, ShortAudioPolicy::Reject).unwrap();
        assert_eq!(one_more.len(), 4);
    }

    #[test]
    fn shorter_than_one_segment_is_rejected() {
        let err = plan(5.0, 10.0).unwrap_err();
        assert!(matches!(err, AnalysisError::TooShort { .. }));
    }

    #[test]
    fn single_segment_policy_shortens_the_only_segment() {
        let plan = SegmentPlan::new(5 * SR as usize, SR, 10.0, ShortAudioPolicy::SingleSegment)
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert_relative_eq!(plan.segments()[0].end_time_seconds, 5.0);
        assert_eq!(plan.segments()[0].end_sample, 5 * SR as usize);
    }

    #[test]
    fn rejects_non_positive_segment_duration() {
        assert!(matches!(plan(5.0, 0.0), Err(AnalysisError::Validation(_))));
        assert!(matches!(plan(5.0, f64::NAN), Err(AnalysisError::Validation(_))));
    }
}
