//! Sensor Segments - activity segmentation for ambient sensor logs
//!
//! Mines chronological sensor activation logs (e.g. smart-home binary
//! sensors) for recurring activity segments through a deterministic pipeline:
//! log reading → transition model → segmentation → dataset / report.
//!
//! ## Modules
//!
//! - **Transition Model**: empirical first-order succession probabilities
//!   between sensors, used as a compatibility oracle
//! - **Segmentation Engine**: single-pass segmentation with B-step tracking of
//!   ambiguous branch points
//! - **Dataset**: labeled sequences for one-class sequence classification

pub mod config;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod segmentation;
pub mod stats;

pub use config::{LogFormat, SegmentationConfig};
pub use dataset::{DatasetBuilder, LabeledSequence, SequenceDataset};
pub use encoder::{ReportEncoder, SegmentationReport};
pub use error::SegmentError;
pub use model::{DeterministicMatrix, SensorId, TransitionModel};
pub use pipeline::{segment_log, threshold_sweep, SegmentationProcessor};
pub use schema::{LogReader, SensorEvent};
pub use segmentation::{BStep, Segment, SegmentedLog, Segmenter};
pub use stats::SegmentStats;

/// Crate version embedded in every report
pub const SEGMENTS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "sensor-segments";
