//! Pipeline orchestration
//!
//! This module provides the public API for sensor log segmentation.
//! It orchestrates the full pipeline from delimited log text to a segmented
//! log: reading → transition model → segmentation.

use crate::config::SegmentationConfig;
use crate::encoder::{ReportEncoder, SegmentationReport};
use crate::error::SegmentError;
use crate::model::TransitionModel;
use crate::schema::{LogReader, SensorEvent};
use crate::segmentation::{SegmentedLog, Segmenter};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::thread;

/// Segment a delimited sensor log (stateless, one-shot).
///
/// The transition model is learned from the same log it segments.
///
/// # Example
/// ```ignore
/// let log = segment_log("M001\nM001\nM002\n", &SegmentationConfig::default())?;
/// println!("{}", log.stats());
/// ```
pub fn segment_log(
    log: &str,
    config: &SegmentationConfig,
) -> Result<SegmentedLog, SegmentError> {
    config.validate()?;

    // Stage 1: Read events
    let events = LogReader::new(config.log_format()).parse_str(log)?;

    // Stage 2: Learn the transition model
    let model = TransitionModel::build(&events);

    // Stage 3: Segment
    Segmenter::new(&model, config.compat_threshold, config.noise_threshold)?.run(events)
}

/// Run one segmentation per compatibility threshold against a shared model.
///
/// Runs are independent and execute on scoped threads; the model and events
/// are only read. Results come back in the order of `thresholds`.
pub fn threshold_sweep(
    model: &TransitionModel,
    events: &[SensorEvent],
    thresholds: &[f64],
    noise_threshold: usize,
) -> Result<Vec<(f64, SegmentedLog)>, SegmentError> {
    if thresholds.is_empty() {
        return Err(SegmentError::InvalidArgument(
            "threshold sweep needs at least one threshold".to_string(),
        ));
    }
    let segmenters = thresholds
        .iter()
        .map(|&t| Segmenter::new(model, t, noise_threshold))
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(runs = segmenters.len(), "starting threshold sweep");

    thread::scope(|scope| {
        let handles: Vec<_> = segmenters
            .iter()
            .map(|segmenter| scope.spawn(move || segmenter.run(events.iter().cloned())))
            .collect();

        thresholds
            .iter()
            .zip(handles)
            .map(|(&threshold, handle)| -> Result<(f64, SegmentedLog), SegmentError> {
                let log = handle
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))?;
                Ok((threshold, log))
            })
            .collect()
    })
}

/// Stateful processor holding a parsed log and its transition model.
///
/// Use this when the same log is segmented several times (threshold tuning,
/// report generation) so the model is learned only once.
#[derive(Debug, Clone)]
pub struct SegmentationProcessor {
    config: SegmentationConfig,
    events: Vec<SensorEvent>,
    model: TransitionModel,
}

impl SegmentationProcessor {
    /// Parse an in-memory log and learn its model
    pub fn from_log_str(log: &str, config: SegmentationConfig) -> Result<Self, SegmentError> {
        config.validate()?;
        let events = LogReader::new(config.log_format()).parse_str(log)?;
        Ok(Self::with_events(events, config))
    }

    /// Read a log from any buffered source and learn its model
    pub fn from_reader<R: BufRead>(
        reader: R,
        config: SegmentationConfig,
    ) -> Result<Self, SegmentError> {
        config.validate()?;
        let events = LogReader::new(config.log_format()).read(reader)?;
        Ok(Self::with_events(events, config))
    }

    /// Read a log file and learn its model
    pub fn from_path(path: &Path, config: SegmentationConfig) -> Result<Self, SegmentError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), config)
    }

    fn with_events(events: Vec<SensorEvent>, config: SegmentationConfig) -> Self {
        if events.len() < 2 {
            tracing::warn!(
                events = events.len(),
                "log too short to establish any transition"
            );
        }
        let model = TransitionModel::build(&events);
        Self {
            config,
            events,
            model,
        }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn events(&self) -> &[SensorEvent] {
        &self.events
    }

    pub fn model(&self) -> &TransitionModel {
        &self.model
    }

    /// Segment with the configured thresholds
    pub fn segment(&self) -> Result<SegmentedLog, SegmentError> {
        self.segment_with(self.config.compat_threshold, self.config.noise_threshold)
    }

    /// Segment with explicit thresholds
    pub fn segment_with(
        &self,
        compat_threshold: f64,
        noise_threshold: usize,
    ) -> Result<SegmentedLog, SegmentError> {
        Segmenter::new(&self.model, compat_threshold, noise_threshold)?
            .run(self.events.iter().cloned())
    }

    /// Segment once per compatibility threshold, keeping the noise threshold
    pub fn sweep(&self, thresholds: &[f64]) -> Result<Vec<(f64, SegmentedLog)>, SegmentError> {
        threshold_sweep(
            &self.model,
            &self.events,
            thresholds,
            self.config.noise_threshold,
        )
    }

    /// Build a report for a segmentation of this log
    pub fn report(&self, log: &SegmentedLog, encoder: &ReportEncoder) -> SegmentationReport {
        encoder.encode(log, &self.config, &self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn sample_log() -> &'static str {
        "2009-06-10\t03:20:59\tM006\tON\n\
         2009-06-10\t03:21:02\tM006\tON\n\
         2009-06-10\t03:21:10\tM007\tON\n\
         2009-06-10\t03:21:14\tM007\tON\n\
         2009-06-10\t03:21:20\tM006\tON\n\
         2009-06-10\t03:21:25\tM006\tON\n\
         2009-06-10\t03:21:31\tM012\tON\n\
         2009-06-10\t03:21:33\tM012\tON\n"
    }

    fn sample_config() -> SegmentationConfig {
        SegmentationConfig {
            compat_threshold: 0.5,
            noise_threshold: 2,
            sensor_id_position: 2,
            delimiter: '\t',
        }
    }

    #[test]
    fn test_segment_log() {
        let log = segment_log(sample_log(), &sample_config()).unwrap();

        assert_eq!(log.segments().len(), 4);
        assert_eq!(log.b_steps().len(), 1);
        let first: Vec<&str> = log.segments()[0].sensor_ids().collect();
        assert_eq!(first, vec!["M006", "M006"]);
        assert_eq!(log.segments()[0].first().field(1), Some("03:20:59"));
    }

    #[test]
    fn test_segment_log_rejects_bad_config() {
        let config = SegmentationConfig {
            compat_threshold: 2.0,
            ..sample_config()
        };
        assert!(matches!(
            segment_log(sample_log(), &config),
            Err(SegmentError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_segment_log_short_records() {
        let result = segment_log("2009-06-10\tM006\n", &sample_config());
        assert!(matches!(
            result,
            Err(SegmentError::MissingField { line: 1, position: 2 })
        ));
    }

    #[test]
    fn test_processor_matches_one_shot() {
        let processor = SegmentationProcessor::from_log_str(sample_log(), sample_config()).unwrap();
        assert_eq!(processor.events().len(), 8);
        assert_eq!(processor.model().len(), 3);

        let one_shot = segment_log(sample_log(), &sample_config()).unwrap();
        assert_eq!(processor.segment().unwrap(), one_shot);
    }

    #[test]
    fn test_processor_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_log().as_bytes()).unwrap();

        let processor = SegmentationProcessor::from_path(file.path(), sample_config()).unwrap();
        assert_eq!(processor.events().len(), 8);
        assert_eq!(processor.segment().unwrap().segments().len(), 4);

        let missing = SegmentationProcessor::from_path(
            &file.path().with_extension("missing"),
            sample_config(),
        );
        assert!(matches!(missing, Err(SegmentError::Io(_))));
    }

    #[test]
    fn test_sweep_matches_sequential_runs() {
        let processor = SegmentationProcessor::from_log_str(sample_log(), sample_config()).unwrap();
        let thresholds = [0.0, 0.25, 0.5, 0.75, 1.0];
        let results = processor.sweep(&thresholds).unwrap();

        assert_eq!(results.len(), thresholds.len());
        for ((threshold, log), expected) in results.iter().zip(thresholds) {
            assert_eq!(*threshold, expected);
            assert_eq!(log, &processor.segment_with(expected, 2).unwrap());
        }
    }

    #[test]
    fn test_sweep_rejects_bad_input() {
        let processor = SegmentationProcessor::from_log_str(sample_log(), sample_config()).unwrap();
        assert!(matches!(
            processor.sweep(&[]),
            Err(SegmentError::InvalidArgument(_))
        ));
        assert!(matches!(
            processor.sweep(&[0.5, -1.0]),
            Err(SegmentError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_processor_report() {
        let processor = SegmentationProcessor::from_log_str(sample_log(), sample_config()).unwrap();
        let log = processor.segment().unwrap();
        let report = processor.report(&log, &ReportEncoder::with_instance_id("test".to_string()));

        assert_eq!(report.config, sample_config());
        assert_eq!(report.stats.count, 4);
        assert_eq!(report.segments[3].records[1][2], "M012");
    }
}
