//! # Session Analytics
//!
//! Figures shown next to the live gauge while a session is being recorded.

use serde::Serialize;

use super::record::round_half_up;
use crate::telemetry::Sample;

/// Bin edges of the RPM distribution histogram.
pub const DISTRIBUTION_EDGES: [f64; 6] = [0.0, 200.0, 400.0, 600.0, 800.0, 1000.0];

/// Current, average and peak RPM of the draft session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LiveStats {
    pub current_rpm: f64,
    pub avg_rpm: f64,
    pub max_rpm: f64,
}

impl LiveStats {
    /// Computes stats for a draft.
    ///
    /// `current_rpm` is the newest sample of `window`, and zero while the
    /// device is off. Average and maximum cover the whole draft.
    pub fn compute(draft: &[Sample], window: &[Sample], device_on: bool) -> Self {
        let current_rpm = if device_on {
            window.last().map_or(0.0, |s| s.rpm)
        } else {
            0.0
        };

        if draft.is_empty() {
            return Self {
                current_rpm,
                ..Self::default()
            };
        }

        let sum: f64 = draft.iter().map(|s| s.rpm).sum();
        Self {
            current_rpm,
            avg_rpm: round_half_up(sum / draft.len() as f64),
            max_rpm: draft.iter().map(|s| s.rpm).fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// One bar of the RPM distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpmBin {
    /// e.g. `"200-400"`
    pub label: String,
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

/// Counts samples per RPM band.
///
/// A sample lands in a bin when `lower < rpm <= upper`. Readings of zero or
/// above the top edge are not counted.
pub fn rpm_distribution(samples: &[Sample]) -> Vec<RpmBin> {
    let mut bins: Vec<RpmBin> = DISTRIBUTION_EDGES
        .windows(2)
        .map(|edge| RpmBin {
            label: format!("{}-{}", edge[0], edge[1]),
            lower: edge[0],
            upper: edge[1],
            count: 0,
        })
        .collect();

    for sample in samples {
        if let Some(bin) = bins
            .iter_mut()
            .find(|b| sample.rpm > b.lower && sample.rpm <= b.upper)
        {
            bin.count += 1;
        }
    }

    bins
}

/// Formats a duration in seconds as `"45s"` or `"2m 5s"`.
pub fn format_duration(seconds: i64) -> String {
    if seconds < 60 {
        return format!("{}s", seconds);
    }
    format!("{}m {}s", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rpms: &[f64]) -> Vec<Sample> {
        rpms.iter()
            .enumerate()
            .map(|(i, &rpm)| Sample::new(i as i64, rpm))
            .collect()
    }

    #[test]
    fn test_live_stats_empty_draft() {
        assert_eq!(LiveStats::compute(&[], &[], true), LiveStats::default());
    }

    #[test]
    fn test_live_stats_values() {
        let draft = at(&[100.0, 250.0, 701.0, 50.0]);
        let stats = LiveStats::compute(&draft, &draft[2..], true);
        assert_eq!(stats.current_rpm, 50.0);
        assert_eq!(stats.avg_rpm, 275.0);
        assert_eq!(stats.max_rpm, 701.0);
    }

    #[test]
    fn test_current_rpm_zero_when_off() {
        let draft = at(&[100.0, 200.0]);
        let stats = LiveStats::compute(&draft, &draft, false);
        assert_eq!(stats.current_rpm, 0.0);
        assert_eq!(stats.max_rpm, 200.0);
    }

    #[test]
    fn test_distribution_labels() {
        let labels: Vec<String> = rpm_distribution(&[]).into_iter().map(|b| b.label).collect();
        assert_eq!(labels, vec!["0-200", "200-400", "400-600", "600-800", "800-1000"]);
    }

    #[test]
    fn test_distribution_edges_are_upper_inclusive() {
        let bins = rpm_distribution(&at(&[0.0, 1.0, 200.0, 200.5, 1000.0, 1000.1]));
        let counts: Vec<usize> = bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 1, 0, 0, 1]);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(60), "1m 0s");
        assert_eq!(format_duration(125), "2m 5s");
    }
}
