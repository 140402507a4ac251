//! Sensor activation event

use crate::error::SegmentError;
use serde::Serialize;

/// One record of a sensor activation log.
///
/// A typical preprocessed record looks like
/// `2009-06-10\t03:20:59.087874\tM006\tON`, where the sensor id sits at a
/// configurable field position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorEvent {
    /// Zero-based position of the event in the log
    pub index: usize,
    /// One-based source line number
    pub line: usize,
    /// Raw record fields
    fields: Vec<String>,
    #[serde(skip)]
    sensor_position: usize,
}

impl SensorEvent {
    /// Create an event, checking that the sensor id field exists
    pub fn new(
        index: usize,
        line: usize,
        fields: Vec<String>,
        sensor_position: usize,
    ) -> Result<Self, SegmentError> {
        if sensor_position >= fields.len() {
            return Err(SegmentError::MissingField {
                line,
                position: sensor_position,
            });
        }
        Ok(Self {
            index,
            line,
            fields,
            sensor_position,
        })
    }

    /// Create a single-field event carrying only a sensor id
    pub fn from_sensor(index: usize, sensor_id: impl Into<String>) -> Self {
        Self {
            index,
            line: index + 1,
            fields: vec![sensor_id.into()],
            sensor_position: 0,
        }
    }

    /// Sensor identifier of this activation
    pub fn sensor_id(&self) -> &str {
        &self.fields[self.sensor_position]
    }

    /// Raw record fields
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Field at `position`, if present
    pub fn field(&self, position: usize) -> Option<&str> {
        self.fields.get(position).map(String::as_str)
    }

    /// Re-join the raw fields with `delimiter`
    pub fn to_record(&self, delimiter: char) -> String {
        let mut buf = [0u8; 4];
        self.fields.join(&*delimiter.encode_utf8(&mut buf))
    }
}

/// Build a single-field event stream from a list of sensor ids
pub fn events_from_ids<S: AsRef<str>>(ids: &[S]) -> Vec<SensorEvent> {
    ids.iter()
        .enumerate()
        .map(|(idx, id)| SensorEvent::from_sensor(idx, id.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sensor_id_position() {
        let event = SensorEvent::new(
            0,
            1,
            fields(&["2009-06-10", "03:20:59.087874", "M006", "ON"]),
            2,
        )
        .unwrap();
        assert_eq!(event.sensor_id(), "M006");
        assert_eq!(event.field(3), Some("ON"));
        assert_eq!(event.field(4), None);
    }

    #[test]
    fn test_missing_sensor_field() {
        let result = SensorEvent::new(0, 7, fields(&["2009-06-10", "03:20:59"]), 2);
        match result {
            Err(SegmentError::MissingField { line, position }) => {
                assert_eq!(line, 7);
                assert_eq!(position, 2);
            }
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn test_to_record() {
        let event = SensorEvent::new(0, 1, fields(&["a", "M001", "ON"]), 1).unwrap();
        assert_eq!(event.to_record('\t'), "a\tM001\tON");
        assert_eq!(event.to_record(','), "a,M001,ON");
    }

    #[test]
    fn test_events_from_ids() {
        let events = events_from_ids(&["A", "B", "A"]);
        assert_eq!(events.len(), 3);
        assert_eq!(events[1].sensor_id(), "B");
        assert_eq!(events[2].index, 2);
        assert_eq!(events[2].line, 3);
    }
}
