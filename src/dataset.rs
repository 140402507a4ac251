//! Sequence dataset construction
//!
//! Turns a segmented log into labeled symbol sequences for a one-class
//! sequence classifier:
//! - Training set: one sequence per retained segment
//! - Validation set: for every B-step, each closed segment joined end to end
//!   with each candidate continuation

use crate::error::SegmentError;
use crate::schema::SensorEvent;
use crate::segmentation::{Segment, SegmentedLog};
use serde::{Deserialize, Serialize};

/// Label given to sequences mined from the log
pub const DEFAULT_LABEL: &str = "GOOD";

/// A symbol sequence with its class label
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledSequence {
    pub tokens: Vec<String>,
    pub label: String,
}

impl LabeledSequence {
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Concatenation of all symbols
    pub fn as_string(&self) -> String {
        self.tokens.concat()
    }
}

/// Collection of labeled sequences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceDataset {
    sequences: Vec<LabeledSequence>,
}

impl SequenceDataset {
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    pub fn sequences(&self) -> &[LabeledSequence] {
        &self.sequences
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabeledSequence> {
        self.sequences.iter()
    }

    /// Append every sequence of `other`
    pub fn extend(&mut self, other: SequenceDataset) {
        self.sequences.extend(other.sequences);
    }

    /// Drop sequences shorter than `min_length` symbols
    pub fn retain_min_length(&mut self, min_length: usize) {
        let before = self.sequences.len();
        self.sequences.retain(|s| s.len() >= min_length);
        tracing::debug!(
            removed = before - self.sequences.len(),
            min_length,
            "filtered dataset"
        );
    }

    /// One JSON object per line
    pub fn to_ndjson(&self) -> Result<String, SegmentError> {
        let mut out = String::new();
        for sequence in &self.sequences {
            out.push_str(&serde_json::to_string(sequence)?);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn to_json(&self) -> Result<String, SegmentError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Builder for training and validation datasets
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    label: String,
    symbol_field: Option<usize>,
}

impl Default for DatasetBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_LABEL)
    }
}

impl DatasetBuilder {
    /// Create a builder assigning `label` to every sequence
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            symbol_field: None,
        }
    }

    /// Take symbols from field `position` instead of the sensor id
    pub fn with_symbol_field(mut self, position: usize) -> Self {
        self.symbol_field = Some(position);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// One sequence per retained segment
    pub fn training_set(&self, log: &SegmentedLog) -> Result<SequenceDataset, SegmentError> {
        let sequences = log
            .segments()
            .iter()
            .map(|segment| self.sequence(&[segment]))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SequenceDataset { sequences })
    }

    /// Cartesian product `closed_segments x compat_segments` of every B-step
    pub fn validation_set(&self, log: &SegmentedLog) -> Result<SequenceDataset, SegmentError> {
        let mut sequences = Vec::new();
        for step in log.b_steps() {
            for closed in log.closed_segments(step) {
                for compat in log.compat_segments(step) {
                    sequences.push(self.sequence(&[closed, compat])?);
                }
            }
        }
        Ok(SequenceDataset { sequences })
    }

    fn sequence(&self, parts: &[&Segment]) -> Result<LabeledSequence, SegmentError> {
        let tokens = parts
            .iter()
            .flat_map(|segment| segment.events())
            .map(|event| self.symbol(event))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(LabeledSequence {
            tokens,
            label: self.label.clone(),
        })
    }

    fn symbol(&self, event: &SensorEvent) -> Result<String, SegmentError> {
        match self.symbol_field {
            None => Ok(event.sensor_id().to_string()),
            Some(position) => event
                .field(position)
                .map(str::to_string)
                .ok_or(SegmentError::MissingField {
                    line: event.line,
                    position,
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TransitionModel;
    use crate::schema::{events_from_ids, SensorEvent};
    use crate::segmentation::Segmenter;
    use pretty_assertions::assert_eq;

    fn branching_log() -> SegmentedLog {
        let names: Vec<String> = ["A", "B", "X", "Y", "Z"].iter().map(|s| s.to_string()).collect();
        let mut matrix = vec![vec![0.0; 5]; 5];
        matrix[0][2] = 0.6; // A -> X
        matrix[0][3] = 0.6; // A -> Y
        matrix[1][2] = 0.6; // B -> X
        matrix[1][3] = 0.6; // B -> Y
        matrix[3][3] = 0.6; // Y -> Y
        let model = TransitionModel::from_parts(names, vec![1; 5], matrix).unwrap();

        let events = events_from_ids(&["A", "B", "X", "Y", "Y", "Z"]);
        Segmenter::new(&model, 0.5, 1).unwrap().run(events).unwrap()
    }

    #[test]
    fn test_training_set() {
        let log = branching_log();
        let dataset = DatasetBuilder::default().training_set(&log).unwrap();

        let strings: Vec<String> = dataset.iter().map(LabeledSequence::as_string).collect();
        assert_eq!(strings, vec!["A", "B", "X", "YY", "Z"]);
        assert!(dataset.iter().all(|s| s.label == DEFAULT_LABEL));
    }

    #[test]
    fn test_validation_set_is_cartesian_product() {
        let log = branching_log();
        let dataset = DatasetBuilder::new("CANDIDATE").validation_set(&log).unwrap();

        let strings: Vec<String> = dataset.iter().map(LabeledSequence::as_string).collect();
        assert_eq!(strings, vec!["AYY", "BYY"]);
        assert_eq!(dataset.sequences()[0].tokens, vec!["A", "Y", "Y"]);
        assert_eq!(dataset.sequences()[0].label, "CANDIDATE");
    }

    #[test]
    fn test_symbol_field() {
        let raw = vec![
            SensorEvent::new(0, 1, vec!["t0".into(), "M001".into(), "a".into()], 1).unwrap(),
            SensorEvent::new(1, 2, vec!["t1".into(), "M002".into(), "b".into()], 1).unwrap(),
        ];
        let log = SegmentedLog::from_segments(vec![Segment::new(raw).unwrap()]).unwrap();

        let by_sensor = DatasetBuilder::default().training_set(&log).unwrap();
        assert_eq!(by_sensor.sequences()[0].as_string(), "M001M002");

        let by_field = DatasetBuilder::default()
            .with_symbol_field(2)
            .training_set(&log)
            .unwrap();
        assert_eq!(by_field.sequences()[0].as_string(), "ab");

        let missing = DatasetBuilder::default().with_symbol_field(5).training_set(&log);
        assert!(matches!(
            missing,
            Err(SegmentError::MissingField { line: 1, position: 5 })
        ));
    }

    #[test]
    fn test_retain_min_length_and_ndjson() {
        let log = branching_log();
        let mut dataset = DatasetBuilder::default().training_set(&log).unwrap();
        dataset.retain_min_length(2);
        assert_eq!(dataset.len(), 1);

        let ndjson = dataset.to_ndjson().unwrap();
        assert_eq!(ndjson.lines().count(), 1);
        let parsed: LabeledSequence = serde_json::from_str(ndjson.trim()).unwrap();
        assert_eq!(parsed.tokens, vec!["Y", "Y"]);

        let json = dataset.to_json().unwrap();
        let loaded: SequenceDataset = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, dataset);
    }
}
