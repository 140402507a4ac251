//! Segmentation report encoding
//!
//! This module encodes a segmented log into a self-describing JSON report.
//! Every report carries producer metadata, the configuration it was computed
//! with, summary statistics, the retained segments and the B-steps.

use crate::config::SegmentationConfig;
use crate::error::SegmentError;
use crate::model::TransitionModel;
use crate::segmentation::SegmentedLog;
use crate::stats::SegmentStats;
use crate::{PRODUCER_NAME, SEGMENTS_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Producer metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Where the report came from and when it was computed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProvenance {
    /// Input log name, if known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Number of events in the input log
    pub event_count: usize,
    /// Distinct sensors seen by the transition model
    pub sensor_count: usize,
    pub computed_at_utc: String,
}

/// A retained segment as written to the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSegment {
    /// Log index of the first event
    pub start: usize,
    /// Log index of the last event
    pub end: usize,
    pub sensors: Vec<String>,
    /// Raw records, one field list per event
    pub records: Vec<Vec<String>>,
}

/// A B-step as written to the report; indices refer to `segments`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportBStep {
    pub position: usize,
    pub closed_segments: Vec<usize>,
    pub compat_segments: Vec<usize>,
}

/// Complete segmentation report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentationReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub provenance: ReportProvenance,
    pub config: SegmentationConfig,
    pub stats: SegmentStats,
    pub segments: Vec<ReportSegment>,
    pub b_steps: Vec<ReportBStep>,
}

/// Encoder for segmentation reports
pub struct ReportEncoder {
    instance_id: String,
    source: Option<String>,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            source: None,
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self {
            instance_id,
            source: None,
        }
    }

    /// Record the input log name in the provenance block
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Encode a segmented log into a report
    pub fn encode(
        &self,
        log: &SegmentedLog,
        config: &SegmentationConfig,
        model: &TransitionModel,
    ) -> SegmentationReport {
        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: SEGMENTS_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        let provenance = ReportProvenance {
            source: self.source.clone(),
            event_count: log.event_count(),
            sensor_count: model.len(),
            computed_at_utc: Utc::now().to_rfc3339(),
        };

        let segments = log
            .segments()
            .iter()
            .map(|segment| ReportSegment {
                start: segment.first().index,
                end: segment.last().index,
                sensors: segment.sensor_ids().map(str::to_string).collect(),
                records: segment.events().iter().map(|e| e.fields().to_vec()).collect(),
            })
            .collect();

        let b_steps = log
            .b_steps()
            .iter()
            .map(|step| ReportBStep {
                position: step.position,
                closed_segments: step.closed_segments.clone(),
                compat_segments: step.compat_segments.clone(),
            })
            .collect();

        SegmentationReport {
            report_version: REPORT_VERSION.to_string(),
            producer,
            provenance,
            config: config.clone(),
            stats: log.stats(),
            segments,
            b_steps,
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(
        &self,
        log: &SegmentedLog,
        config: &SegmentationConfig,
        model: &TransitionModel,
    ) -> Result<String, SegmentError> {
        let report = self.encode(log, config, model);
        serde_json::to_string_pretty(&report).map_err(SegmentError::JsonError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::events_from_ids;
    use crate::segmentation::Segmenter;
    use pretty_assertions::assert_eq;

    fn scenario() -> (SegmentedLog, SegmentationConfig, TransitionModel) {
        let events = events_from_ids(&["A", "A", "B", "B", "A", "A", "C", "C"]);
        let model = TransitionModel::build(&events);
        let config = SegmentationConfig {
            compat_threshold: 0.5,
            noise_threshold: 2,
            ..Default::default()
        };
        let log = Segmenter::new(&model, config.compat_threshold, config.noise_threshold)
            .unwrap()
            .run(events)
            .unwrap();
        (log, config, model)
    }

    #[test]
    fn test_report_contents() {
        let (log, config, model) = scenario();
        let encoder = ReportEncoder::with_instance_id("run-1".to_string()).with_source("toy.tsv");
        let report = encoder.encode(&log, &config, &model);

        assert_eq!(report.producer.name, PRODUCER_NAME);
        assert_eq!(report.producer.instance_id, "run-1");
        assert_eq!(report.provenance.source.as_deref(), Some("toy.tsv"));
        assert_eq!(report.provenance.event_count, 8);
        assert_eq!(report.provenance.sensor_count, 3);
        assert_eq!(report.segments.len(), 4);
        assert_eq!(report.segments[1].sensors, vec!["B", "B"]);
        assert_eq!((report.segments[1].start, report.segments[1].end), (2, 3));
        assert_eq!(report.b_steps.len(), 1);
        assert_eq!(report.b_steps[0].closed_segments, vec![0, 1]);
    }

    #[test]
    fn test_report_json() {
        let (log, config, model) = scenario();
        let json = ReportEncoder::new().encode_to_json(&log, &config, &model).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["report_version"], REPORT_VERSION);
        assert_eq!(value["config"]["noise_threshold"], 2);
        assert_eq!(value["stats"]["count"], 4);
        assert_eq!(value["stats"]["b_step_count"], 1);
        assert!(!value["producer"]["instance_id"].as_str().unwrap().is_empty());
        assert_eq!(value["segments"][3]["records"][0][0], "C");
    }
}
