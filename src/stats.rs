//! Segmented log statistics
//!
//! Aggregates used to inspect a segmentation: segment count, length range,
//! mean length, B-step count and the length distribution.

use crate::segmentation::{Segment, SegmentedLog};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Summary statistics of a segmented log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    /// Number of retained segments
    pub count: usize,
    /// Shortest segment length (0 when there are no segments)
    pub min_length: usize,
    /// Longest segment length (0 when there are no segments)
    pub max_length: usize,
    /// Mean segment length (0 when there are no segments)
    pub mean_length: f64,
    /// Number of B-steps
    pub b_step_count: usize,
    /// Segments dropped by the noise filter
    pub discarded_count: usize,
    /// `length -> number of segments`
    pub length_distribution: BTreeMap<usize, usize>,
    /// Segment lengths in closing order
    pub lengths: Vec<usize>,
}

impl SegmentStats {
    /// Compute statistics over the retained segments of `log`
    pub fn from_segmented(log: &SegmentedLog) -> Self {
        let lengths: Vec<usize> = log.segments().iter().map(Segment::len).collect();

        let mut length_distribution = BTreeMap::new();
        for &len in &lengths {
            *length_distribution.entry(len).or_insert(0) += 1;
        }

        let mean_length = if lengths.is_empty() {
            0.0
        } else {
            lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
        };

        Self {
            count: lengths.len(),
            min_length: lengths.iter().copied().min().unwrap_or(0),
            max_length: lengths.iter().copied().max().unwrap_or(0),
            mean_length,
            b_step_count: log.b_steps().len(),
            discarded_count: log.discarded_segments(),
            length_distribution,
            lengths,
        }
    }
}

impl fmt::Display for SegmentStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "segments num: {}", self.count)?;
        writeln!(f, "min length:   {}", self.min_length)?;
        writeln!(f, "max length:   {}", self.max_length)?;
        writeln!(f, "avg length:   {:.3}", self.mean_length)?;
        writeln!(f, "b-steps:      {}", self.b_step_count)?;
        write!(f, "discarded:    {}", self.discarded_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransitionModel;
    use crate::schema::events_from_ids;
    use crate::segmentation::Segmenter;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_stats_for_learned_scenario() {
        let events = events_from_ids(&["A", "A", "B", "B", "A", "A", "C", "C"]);
        let model = TransitionModel::build(&events);
        let log = Segmenter::new(&model, 0.5, 2).unwrap().run(events).unwrap();

        let stats = log.stats();
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min_length, 2);
        assert_eq!(stats.max_length, 2);
        assert!((stats.mean_length - 2.0).abs() < 1e-9);
        assert_eq!(stats.b_step_count, 1);
        assert_eq!(stats.length_distribution, BTreeMap::from([(2, 4)]));
        assert_eq!(stats.lengths, vec![2, 2, 2, 2]);
    }

    #[test]
    fn test_stats_for_mixed_lengths() {
        let segments = [vec!["A"], vec!["A", "B", "C"], vec!["B", "B"], vec!["C", "A", "C"]]
            .iter()
            .map(|ids| Segment::new(events_from_ids(ids)).unwrap())
            .collect();
        let log = SegmentedLog::from_segments(segments).unwrap();

        let stats = SegmentStats::from_segmented(&log);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min_length, 1);
        assert_eq!(stats.max_length, 3);
        assert!((stats.mean_length - 2.25).abs() < 1e-9);
        assert_eq!(stats.b_step_count, 0);
        assert_eq!(
            stats.length_distribution,
            BTreeMap::from([(1, 1), (2, 1), (3, 2)])
        );
    }

    #[test]
    fn test_stats_for_empty_result() {
        let events = events_from_ids(&["A"]);
        let model = TransitionModel::build(&events);
        let log = Segmenter::new(&model, 0.5, 3).unwrap().run(events).unwrap();

        let stats = log.stats();
        assert_eq!(stats.count, 0);
        assert_eq!(stats.min_length, 0);
        assert_eq!(stats.mean_length, 0.0);
        assert_eq!(stats.discarded_count, 1);
        assert!(stats.to_string().contains("segments num: 0"));
    }
}
