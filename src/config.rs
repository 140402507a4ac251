//! Segmentation configuration
//!
//! Thresholds and log layout options shared by the model builder, the
//! segmenter and the CLI. Configurations can be loaded from JSON; missing keys
//! fall back to the defaults below.

use crate::error::SegmentError;
use serde::{Deserialize, Serialize};

/// Default minimum transition probability for two activations to be compatible
pub const DEFAULT_COMPAT_THRESHOLD: f64 = 0.1;

/// Default minimum segment length
pub const DEFAULT_NOISE_THRESHOLD: usize = 2;

/// Default field position of the sensor id in a log record
pub const DEFAULT_SENSOR_ID_POSITION: usize = 0;

/// Default field delimiter
pub const DEFAULT_DELIMITER: char = '\t';

/// Layout of a delimited sensor log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFormat {
    /// Field delimiter
    pub delimiter: char,
    /// Zero-based position of the sensor id field
    pub sensor_id_position: usize,
}

impl Default for LogFormat {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            sensor_id_position: DEFAULT_SENSOR_ID_POSITION,
        }
    }
}

/// Options recognised by a segmentation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Minimum transition probability for "compatible" (0-1)
    pub compat_threshold: f64,
    /// Minimum segment length to retain (>= 1)
    pub noise_threshold: usize,
    /// Zero-based position of the sensor id field
    pub sensor_id_position: usize,
    /// Field delimiter
    pub delimiter: char,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            compat_threshold: DEFAULT_COMPAT_THRESHOLD,
            noise_threshold: DEFAULT_NOISE_THRESHOLD,
            sensor_id_position: DEFAULT_SENSOR_ID_POSITION,
            delimiter: DEFAULT_DELIMITER,
        }
    }
}

impl SegmentationConfig {
    /// Load a configuration from JSON and validate it
    pub fn from_json(json: &str) -> Result<Self, SegmentError> {
        let config: SegmentationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Log layout described by this configuration
    pub fn log_format(&self) -> LogFormat {
        LogFormat {
            delimiter: self.delimiter,
            sensor_id_position: self.sensor_id_position,
        }
    }

    /// Check that thresholds are in range
    pub fn validate(&self) -> Result<(), SegmentError> {
        validate_compat_threshold(self.compat_threshold)?;
        validate_noise_threshold(self.noise_threshold)
    }
}

pub(crate) fn validate_compat_threshold(threshold: f64) -> Result<(), SegmentError> {
    validate_unit_threshold("compat_threshold", threshold)
}

/// Check that the threshold called `name` lies in `[0, 1]`
pub(crate) fn validate_unit_threshold(name: &str, threshold: f64) -> Result<(), SegmentError> {
    // NaN fails the range check as well
    if !(0.0..=1.0).contains(&threshold) {
        return Err(SegmentError::threshold_out_of_range(name, threshold));
    }
    Ok(())
}

pub(crate) fn validate_noise_threshold(threshold: usize) -> Result<(), SegmentError> {
    if threshold == 0 {
        return Err(SegmentError::InvalidArgument(
            "noise_threshold must be at least 1".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SegmentationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.delimiter, '\t');
        assert_eq!(config.noise_threshold, 2);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = SegmentationConfig::from_json(r#"{"compat_threshold": 0.4}"#).unwrap();
        assert_eq!(config.compat_threshold, 0.4);
        assert_eq!(config.noise_threshold, DEFAULT_NOISE_THRESHOLD);
        assert_eq!(config.sensor_id_position, DEFAULT_SENSOR_ID_POSITION);
    }

    #[test]
    fn test_out_of_range_compat_threshold() {
        let result = SegmentationConfig::from_json(r#"{"compat_threshold": 1.5}"#);
        assert!(matches!(result, Err(SegmentError::InvalidArgument(_))));

        assert!(validate_compat_threshold(-0.01).is_err());
        assert!(validate_compat_threshold(f64::NAN).is_err());
        assert!(validate_compat_threshold(0.0).is_ok());
        assert!(validate_compat_threshold(1.0).is_ok());
    }

    #[test]
    fn test_zero_noise_threshold() {
        let config = SegmentationConfig {
            noise_threshold: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SegmentError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let config = SegmentationConfig {
            compat_threshold: 0.25,
            noise_threshold: 3,
            sensor_id_position: 2,
            delimiter: ',',
        };
        let json = config.to_json().unwrap();
        assert_eq!(SegmentationConfig::from_json(&json).unwrap(), config);
    }
}
