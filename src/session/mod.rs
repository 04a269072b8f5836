//! # Session Module
//!
//! Recording device-on intervals and working with finalized sessions.
//!
//! This module handles:
//! - Accumulating the full-resolution draft while the device is on
//! - Finalizing a draft into an immutable [`Session`] with summary statistics
//! - Live dashboard statistics and the RPM distribution
//! - Time-normalizing sessions for overlay comparison
//! - CSV export

pub mod accumulator;
pub mod analytics;
pub mod compare;
pub mod export;
pub mod record;

pub use accumulator::SessionAccumulator;
pub use analytics::{format_duration, rpm_distribution, LiveStats, RpmBin};
pub use compare::{compare, normalize, ComparisonSeries, ComparisonSet, ElapsedPoint, MIN_COMPARE_SESSIONS};
pub use export::{export_filename, to_csv, write_csv};
pub use record::{round_half_up, Session};
