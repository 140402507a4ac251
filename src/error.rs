//! Error types for sensor log segmentation

use thiserror::Error;

/// Errors that can occur while reading, modelling or segmenting a sensor log
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown sensor id: {0}")]
    UnknownSensor(String),

    #[error("Missing field {position} on line {line}")]
    MissingField { line: usize, position: usize },

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SegmentError {
    /// Shorthand for a threshold that falls outside `[0, 1]`
    pub(crate) fn threshold_out_of_range(name: &str, value: f64) -> Self {
        SegmentError::InvalidArgument(format!(
            "{name} must be a value between 0 and 1 (included), got {value}"
        ))
    }
}
