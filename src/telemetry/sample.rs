//! # RPM Sample
//!
//! A single timestamped reading as pushed by the sensor device.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped RPM reading.
///
/// Samples carry no identity beyond `(timestamp, rpm)`. Timestamps are epoch
/// milliseconds and are not guaranteed to be strictly increasing.
///
/// # Examples
///
/// ```
/// use tachometer_monitor::telemetry::Sample;
///
/// let sample = Sample::new(1_700_000_000_000, 250.0);
/// assert_eq!(sample.iso_timestamp().as_deref(), Some("2023-11-14T22:13:20.000Z"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Revolutions per minute
    pub rpm: f64,
}

impl Sample {
    /// Creates a new sample.
    #[must_use]
    pub fn new(timestamp: i64, rpm: f64) -> Self {
        Self { timestamp, rpm }
    }

    /// Timestamp rendered as ISO-8601 UTC with millisecond precision.
    ///
    /// Returns `None` when the timestamp is outside chrono's representable range.
    pub fn iso_timestamp(&self) -> Option<String> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso_timestamp_epoch() {
        let sample = Sample::new(0, 0.0);
        assert_eq!(sample.iso_timestamp().as_deref(), Some("1970-01-01T00:00:00.000Z"));
    }

    #[test]
    fn test_iso_timestamp_keeps_millis() {
        let sample = Sample::new(1_700_000_000_123, 10.0);
        assert_eq!(sample.iso_timestamp().as_deref(), Some("2023-11-14T22:13:20.123Z"));
    }

    #[test]
    fn test_wire_format() {
        let sample: Sample = serde_json::from_str(r#"{"timestamp":1000,"rpm":512.5}"#).unwrap();
        assert_eq!(sample, Sample::new(1000, 512.5));
    }
}
