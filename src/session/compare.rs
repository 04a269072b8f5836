//! # Session Comparison
//!
//! Overlays several finalized sessions on a shared time axis by measuring each
//! sample from its own session's start.

use serde::Serialize;
use tracing::debug;

use super::record::Session;

/// Fewest matching sessions that make a comparison
pub const MIN_COMPARE_SESSIONS: usize = 2;

/// A sample positioned relative to its session's start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElapsedPoint {
    /// Seconds since the session started
    pub elapsed_secs: f64,
    pub rpm: f64,
}

/// One session prepared for overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSeries {
    pub session_id: String,
    pub start_time: i64,
    pub points: Vec<ElapsedPoint>,
}

/// The set of series to draw together.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComparisonSet {
    pub series: Vec<ComparisonSeries>,
    /// Smallest and largest elapsed time across all series
    pub elapsed_range: Option<(f64, f64)>,
}

impl ComparisonSet {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Time-normalizes one session.
pub fn normalize(session: &Session) -> ComparisonSeries {
    let points = session
        .data
        .iter()
        .map(|s| ElapsedPoint {
            elapsed_secs: (s.timestamp - session.start_time) as f64 / 1000.0,
            rpm: s.rpm,
        })
        .collect();

    ComparisonSeries {
        session_id: session.id.clone(),
        start_time: session.start_time,
        points,
    }
}

/// Builds a comparison from the sessions in `history` whose IDs are in `ids`.
///
/// Series follow history order (newest first), not the order of `ids`.
/// Unknown IDs are ignored. Fewer than [`MIN_COMPARE_SESSIONS`] matches give
/// an empty set.
pub fn compare(history: &[Session], ids: &[String]) -> ComparisonSet {
    let series: Vec<ComparisonSeries> = history
        .iter()
        .filter(|s| ids.contains(&s.id))
        .map(normalize)
        .collect();

    if series.len() < MIN_COMPARE_SESSIONS {
        debug!("Comparison needs {} sessions, {} matched", MIN_COMPARE_SESSIONS, series.len());
        return ComparisonSet::default();
    }

    let elapsed_range = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.elapsed_secs))
        .fold(None, |range: Option<(f64, f64)>, t| match range {
            None => Some((t, t)),
            Some((lo, hi)) => Some((lo.min(t), hi.max(t))),
        });

    ComparisonSet {
        series,
        elapsed_range,
    }
}
