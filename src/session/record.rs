//! # Finalized Session Record
//!
//! Summary statistics are computed once, when the draft is closed:
//!
//! - `avgRpm = round(sum(rpm) / count)`
//! - `maxRpm = max(rpm)`, `minRpm = min(rpm)`
//! - `duration = round((endTime - startTime) / 1000)` seconds
//!
//! Rounding is half-up (`-2.5` rounds to `-2`, `2.5` to `3`), matching how the
//! persisted history has always been written.

use serde::{Deserialize, Serialize};

use crate::telemetry::Sample;

/// Prefix of every session ID; the suffix is the start time in epoch millis.
pub const SESSION_ID_PREFIX: &str = "session_";

/// One contiguous device-on interval, immutable once finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub start_time: i64,
    pub end_time: i64,
    /// Whole seconds
    pub duration: i64,
    /// Samples in arrival order
    pub data: Vec<Sample>,
    pub avg_rpm: f64,
    pub max_rpm: f64,
    pub min_rpm: f64,
}

impl Session {
    /// Builds a finalized session from a closed draft.
    ///
    /// Returns `None` for degenerate drafts (fewer than two samples).
    /// An `end_time` before `start_time` is clamped to `start_time`.
    pub fn finalize(start_time: i64, end_time: i64, data: Vec<Sample>) -> Option<Self> {
        if data.len() <= 1 {
            return None;
        }

        let end_time = end_time.max(start_time);
        let sum: f64 = data.iter().map(|s| s.rpm).sum();
        let max_rpm = data.iter().map(|s| s.rpm).fold(f64::NEG_INFINITY, f64::max);
        let min_rpm = data.iter().map(|s| s.rpm).fold(f64::INFINITY, f64::min);
        let elapsed_ms = (end_time - start_time) as f64;

        Some(Self {
            id: session_id(start_time),
            start_time,
            end_time,
            duration: round_half_up(elapsed_ms / 1000.0) as i64,
            avg_rpm: round_half_up(sum / data.len() as f64),
            max_rpm,
            min_rpm,
            data,
        })
    }

    /// Number of recorded samples
    pub fn sample_count(&self) -> usize {
        self.data.len()
    }
}

/// Deterministic session ID derived from the start time.
pub fn session_id(start_time: i64) -> String {
    format!("{}{}", SESSION_ID_PREFIX, start_time)
}

/// Rounds to the nearest integer, ties towards positive infinity.
#[must_use]
pub fn round_half_up(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}
