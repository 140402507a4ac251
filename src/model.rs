//! Transition compatibility model
//!
//! An empirical first-order transition table over sensor ids, learned from a
//! sensor log. Cell `(r, c)` holds the probability that an activation of `r`
//! is directly followed by an activation of `c`, normalised by the total
//! number of occurrences of `r`. Rows are therefore not guaranteed to sum to
//! one: a sensor that closes the log has one occurrence without a successor.
//!
//! Sensor ids are interned to dense [`SensorId`] indices. The matrix is grown
//! lazily while the log is scanned and is read-only once built, so a single
//! model can be shared by any number of segmentation runs.

use crate::config::validate_unit_threshold;
use crate::error::SegmentError;
use crate::schema::SensorEvent;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Interned sensor identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SensorId(usize);

impl SensorId {
    /// Dense index of this sensor in the model
    pub fn index(self) -> usize {
        self.0
    }
}

/// Probabilistic transition table learned from a sensor log
///
/// Deserializing goes through [`TransitionModel::from_parts`], so a loaded
/// model is validated and its sensor lookup is rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TransitionModel {
    /// Sensor names in order of first appearance
    sensors: Vec<String>,
    /// Total occurrences per sensor
    occurrences: Vec<u64>,
    /// Square matrix indexed by `SensorId`
    matrix: Vec<Vec<f64>>,
    #[serde(skip)]
    lookup: HashMap<String, SensorId>,
}

/// Serialized form of a [`TransitionModel`], before validation
#[derive(Deserialize)]
struct RawTransitionModel {
    sensors: Vec<String>,
    occurrences: Vec<u64>,
    matrix: Vec<Vec<f64>>,
}

impl RawTransitionModel {
    fn validate(self) -> Result<TransitionModel, SegmentError> {
        TransitionModel::from_parts(self.sensors, self.occurrences, self.matrix)
    }
}

impl<'de> Deserialize<'de> for TransitionModel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawTransitionModel::deserialize(deserializer)?
            .validate()
            .map_err(serde::de::Error::custom)
    }
}

impl TransitionModel {
    /// Build the model from an ordered event stream.
    ///
    /// An empty stream yields an empty model. A single event yields a model
    /// with one sensor, one occurrence and a zero self-transition.
    pub fn build<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a SensorEvent>,
    {
        let mut model = Self::default();
        let mut events = events.into_iter();

        let Some(first) = events.next() else {
            return model;
        };

        // sliding window of two events per step
        let mut prev = model.add_sensor(first.sensor_id());
        model.occurrences[prev.0] += 1;

        let mut transitions = 0usize;
        for curr in events {
            let curr = model.add_sensor(curr.sensor_id());
            model.occurrences[curr.0] += 1;
            model.matrix[prev.0][curr.0] += 1.0;
            transitions += 1;
            prev = curr;
        }

        for (row, &count) in model.matrix.iter_mut().zip(&model.occurrences) {
            for cell in row.iter_mut().filter(|c| **c != 0.0) {
                *cell /= count as f64;
            }
        }

        tracing::debug!(
            sensors = model.sensors.len(),
            transitions,
            "built transition model"
        );
        model
    }

    /// Rebuild a model from explicit parts.
    ///
    /// `matrix` must be square with one row per sensor and every cell in
    /// `[0, 1]`; every occurrence count must be positive.
    pub fn from_parts(
        sensors: Vec<String>,
        occurrences: Vec<u64>,
        matrix: Vec<Vec<f64>>,
    ) -> Result<Self, SegmentError> {
        let n = sensors.len();
        if occurrences.len() != n || matrix.len() != n {
            return Err(SegmentError::InvalidArgument(format!(
                "expected {n} occurrence counts and {n} matrix rows, got {} and {}",
                occurrences.len(),
                matrix.len()
            )));
        }
        if let Some(pos) = occurrences.iter().position(|&c| c == 0) {
            return Err(SegmentError::InvalidArgument(format!(
                "sensor {} has no occurrences",
                sensors[pos]
            )));
        }
        for (name, row) in sensors.iter().zip(&matrix) {
            if row.len() != n {
                return Err(SegmentError::InvalidArgument(format!(
                    "row {name} has {} columns, expected {n}",
                    row.len()
                )));
            }
            if let Some(value) = row.iter().find(|v| !(0.0..=1.0).contains(*v)) {
                return Err(SegmentError::InvalidArgument(format!(
                    "row {name} holds out-of-range probability {value}"
                )));
            }
        }

        let mut lookup = HashMap::with_capacity(n);
        for (idx, name) in sensors.iter().enumerate() {
            if lookup.insert(name.clone(), SensorId(idx)).is_some() {
                return Err(SegmentError::InvalidArgument(format!(
                    "duplicate sensor id {name}"
                )));
            }
        }

        Ok(Self {
            sensors,
            occurrences,
            matrix,
            lookup,
        })
    }

    /// Load a model previously written with [`TransitionModel::to_json`]
    pub fn from_json(json: &str) -> Result<Self, SegmentError> {
        let raw: RawTransitionModel = serde_json::from_str(json)?;
        raw.validate()
            .map_err(|e| SegmentError::ParseError(format!("invalid transition model: {e}")))
    }

    /// Serialize the model to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Add a row and a column for `sensor` if it is not known yet.
    fn add_sensor(&mut self, sensor: &str) -> SensorId {
        if let Some(&id) = self.lookup.get(sensor) {
            return id;
        }

        let id = SensorId(self.sensors.len());
        if self.matrix.is_empty() {
            self.matrix.push(vec![0.0]);
        } else {
            for row in &mut self.matrix {
                row.push(0.0);
            }
            self.matrix.push(vec![0.0; id.0 + 1]);
        }
        self.sensors.push(sensor.to_string());
        self.occurrences.push(0);
        self.lookup.insert(sensor.to_string(), id);
        id
    }

    /// Number of distinct sensors
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Sensor names in order of first appearance
    pub fn sensors(&self) -> impl Iterator<Item = &str> {
        self.sensors.iter().map(String::as_str)
    }

    /// Interned id of `sensor`, if it appears in the model
    pub fn sensor_id(&self, sensor: &str) -> Option<SensorId> {
        self.lookup.get(sensor).copied()
    }

    /// Interned id of `sensor`, failing for out-of-vocabulary ids
    pub fn resolve(&self, sensor: &str) -> Result<SensorId, SegmentError> {
        self.sensor_id(sensor)
            .ok_or_else(|| SegmentError::UnknownSensor(sensor.to_string()))
    }

    /// Name of an interned sensor; `None` for an id from another model
    pub fn sensor_name(&self, id: SensorId) -> Option<&str> {
        self.sensors.get(id.0).map(String::as_str)
    }

    /// Total number of occurrences of `sensor` in the log
    pub fn occurrences(&self, sensor: &str) -> Option<u64> {
        self.sensor_id(sensor).map(|id| self.occurrences[id.0])
    }

    /// Probability that `from` is directly followed by `to`
    pub fn probability(&self, from: &str, to: &str) -> Result<f64, SegmentError> {
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        Ok(self.probability_by_id(from, to))
    }

    /// Probability lookup on ids interned by this model
    pub(crate) fn probability_by_id(&self, from: SensorId, to: SensorId) -> f64 {
        self.matrix[from.0][to.0]
    }

    /// Sum of the outgoing probabilities of `sensor`
    pub fn row_sum(&self, sensor: &str) -> Result<f64, SegmentError> {
        let id = self.resolve(sensor)?;
        Ok(self.matrix[id.0].iter().sum())
    }

    /// True when every row has one cell per sensor
    pub fn is_square(&self) -> bool {
        self.matrix.len() == self.sensors.len()
            && self.matrix.iter().all(|row| row.len() == self.sensors.len())
    }

    /// Nested `row -> column -> probability` view, ordered by sensor name
    pub fn to_nested_map(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        nested_map(&self.sensors, &self.matrix)
    }

    /// Copy of the matrix where every cell `>= threshold` becomes 1, else 0
    pub fn deterministic_view(&self, threshold: f64) -> Result<DeterministicMatrix, SegmentError> {
        validate_unit_threshold("threshold", threshold)?;

        let cells = self
            .matrix
            .iter()
            .map(|row| row.iter().map(|&p| u8::from(p >= threshold)).collect())
            .collect();

        Ok(DeterministicMatrix {
            threshold,
            sensors: self.sensors.clone(),
            cells,
        })
    }
}

/// Thresholded 0/1 copy of a [`TransitionModel`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeterministicMatrix {
    pub threshold: f64,
    sensors: Vec<String>,
    cells: Vec<Vec<u8>>,
}

impl DeterministicMatrix {
    /// Cell value for `from -> to`, if both sensors are known
    pub fn get(&self, from: &str, to: &str) -> Option<u8> {
        let row = self.sensors.iter().position(|s| s == from)?;
        let col = self.sensors.iter().position(|s| s == to)?;
        Some(self.cells[row][col])
    }

    /// Number of cells set to 1
    pub fn ones(&self) -> usize {
        self.cells
            .iter()
            .map(|row| row.iter().filter(|&&c| c == 1).count())
            .sum()
    }

    /// Nested `row -> column -> 0/1` view, ordered by sensor name
    pub fn to_nested_map(&self) -> BTreeMap<String, BTreeMap<String, u8>> {
        nested_map(&self.sensors, &self.cells)
    }
}

fn nested_map<T: Copy>(sensors: &[String], cells: &[Vec<T>]) -> BTreeMap<String, BTreeMap<String, T>> {
    sensors
        .iter()
        .zip(cells)
        .map(|(row_name, row)| {
            let cols = sensors.iter().cloned().zip(row.iter().copied()).collect();
            (row_name.clone(), cols)
        })
        .collect()
}
