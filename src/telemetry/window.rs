//! # Live Window
//!
//! The bounded, most-recent view of a draft session used for charting.
//!
//! The window is recomputed from the full draft log on every update instead of
//! being kept in a separate ring buffer, so it cannot drift from the log.

use super::Sample;

/// Number of samples shown in the live chart.
pub const LIVE_WINDOW_SIZE: usize = 30;

/// Returns the final `n` samples of `log`, or all of them if the log is shorter.
///
/// # Examples
///
/// ```
/// use tachometer_monitor::telemetry::{last_n, Sample};
///
/// let log: Vec<Sample> = (0..5).map(|i| Sample::new(i, i as f64)).collect();
/// assert_eq!(last_n(&log, 2), &log[3..]);
/// assert!(last_n(&[], 30).is_empty());
/// ```
#[must_use]
pub fn last_n(log: &[Sample], n: usize) -> &[Sample] {
    &log[log.len().saturating_sub(n)..]
}
