//! # Session Accumulator
//!
//! Owns the full-resolution sample log of the draft session while the device
//! is on, and turns it into a [`Session`] when the device goes off.
//!
//! At most one draft is open at a time. Samples are kept in arrival order;
//! nothing is re-sorted by timestamp.
//!
//! ## Usage
//!
//! ```
//! use tachometer_monitor::session::SessionAccumulator;
//! use tachometer_monitor::telemetry::Sample;
//!
//! let mut acc = SessionAccumulator::new();
//! acc.open(0)?;
//! acc.append(&[Sample::new(0, 100.0)])?;
//! acc.append(&[Sample::new(1000, 300.0), Sample::new(2000, 500.0)])?;
//!
//! let session = acc.close(3000)?.expect("three samples make a session");
//! assert_eq!(session.duration, 3);
//! assert_eq!(session.avg_rpm, 300.0);
//! # Ok::<(), tachometer_monitor::error::MonitorError>(())
//! ```

use tracing::{debug, warn};

use super::record::Session;
use crate::error::{MonitorError, Result};
use crate::telemetry::Sample;

#[derive(Debug, Clone)]
struct Draft {
    start_time: i64,
    samples: Vec<Sample>,
}

/// Accumulates samples for the currently open session.
#[derive(Debug, Clone, Default)]
pub struct SessionAccumulator {
    draft: Option<Draft>,
}

impl SessionAccumulator {
    /// Creates an accumulator with no open draft.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begins a new draft starting at `start_time` (epoch millis).
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if a draft is already open.
    pub fn open(&mut self, start_time: i64) -> Result<()> {
        if self.draft.is_some() {
            return Err(MonitorError::InvalidState(
                "cannot open a session while another draft is open".to_string(),
            ));
        }

        debug!("Opened draft session at {}", start_time);
        self.draft = Some(Draft {
            start_time,
            samples: Vec::new(),
        });
        Ok(())
    }

    /// Extends the draft with a batch, preserving arrival order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if no draft is open.
    pub fn append(&mut self, batch: &[Sample]) -> Result<()> {
        let draft = self.draft_mut()?;
        draft.samples.extend_from_slice(batch);
        Ok(())
    }

    /// Extends the draft with a single sample.
    pub fn push(&mut self, sample: Sample) -> Result<()> {
        self.append(std::slice::from_ref(&sample))
    }

    /// Finalizes the draft.
    ///
    /// Returns `Ok(None)` when the draft holds one sample or fewer; such a
    /// session is dropped without being recorded. The draft is cleared either way.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if no draft is open.
    pub fn close(&mut self, end_time: i64) -> Result<Option<Session>> {
        let draft = self.draft.take().ok_or_else(|| {
            MonitorError::InvalidState("cannot close a session that was never opened".to_string())
        })?;

        if end_time < draft.start_time {
            warn!(
                "Session end {} precedes start {}; clamping to start",
                end_time, draft.start_time
            );
        }

        let count = draft.samples.len();
        let session = Session::finalize(draft.start_time, end_time, draft.samples);
        if session.is_none() {
            debug!("Discarded degenerate session with {} sample(s)", count);
        }
        Ok(session)
    }

    /// Drops the draft without finalizing it. Returns the number of samples lost.
    pub fn discard(&mut self) -> usize {
        self.draft.take().map_or(0, |d| d.samples.len())
    }

    /// Whether a draft is currently open
    pub fn is_open(&self) -> bool {
        self.draft.is_some()
    }

    /// Start time of the open draft
    pub fn start_time(&self) -> Option<i64> {
        self.draft.as_ref().map(|d| d.start_time)
    }

    /// Samples of the open draft, empty if none is open
    pub fn samples(&self) -> &[Sample] {
        self.draft.as_ref().map_or(&[], |d| d.samples.as_slice())
    }

    fn draft_mut(&mut self) -> Result<&mut Draft> {
        self.draft.as_mut().ok_or_else(|| {
            MonitorError::InvalidState("cannot append samples without an open session".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_three_samples() {
        let mut acc = SessionAccumulator::new();
        acc.open(0).unwrap();
        acc.append(&[Sample::new(0, 100.0)]).unwrap();
        acc.append(&[Sample::new(1000, 300.0), Sample::new(2000, 500.0)]).unwrap();

        let session = acc.close(3000).unwrap().unwrap();
        assert_eq!(session.duration, 3);
        assert_eq!(session.avg_rpm, 300.0);
        assert_eq!(session.max_rpm, 500.0);
        assert_eq!(session.min_rpm, 100.0);
        assert_eq!(session.data.len(), 3);
        assert_eq!(session.id, "session_0");
        assert!(!acc.is_open());
    }

    #[test]
    fn test_single_sample_discarded() {
        let mut acc = SessionAccumulator::new();
        acc.open(10).unwrap();
        acc.push(Sample::new(20, 400.0)).unwrap();
        assert_eq!(acc.close(30).unwrap(), None);
        assert!(!acc.is_open());
    }

    #[test]
    fn test_empty_draft_discarded() {
        let mut acc = SessionAccumulator::new();
        acc.open(10).unwrap();
        assert_eq!(acc.close(30).unwrap(), None);
    }

    #[test]
    fn test_draft_is_concatenation_of_batches() {
        let batches = vec![
            vec![Sample::new(5, 1.0), Sample::new(3, 2.0)],
            vec![],
            vec![Sample::new(4, 3.0)],
            vec![Sample::new(4, 4.0), Sample::new(9, 5.0), Sample::new(1, 6.0)],
        ];

        let mut acc = SessionAccumulator::new();
        acc.open(0).unwrap();
        for batch in &batches {
            acc.append(batch).unwrap();
        }

        let expected: Vec<Sample> = batches.concat();
        assert_eq!(acc.samples(), expected.as_slice());
    }

    #[test]
    fn test_open_twice_is_invalid() {
        let mut acc = SessionAccumulator::new();
        acc.open(0).unwrap();
        assert!(matches!(acc.open(1), Err(MonitorError::InvalidState(_))));
        assert_eq!(acc.start_time(), Some(0));
    }

    #[test]
    fn test_close_without_draft_is_invalid() {
        let mut acc = SessionAccumulator::new();
        assert!(matches!(acc.close(0), Err(MonitorError::InvalidState(_))));
    }

    #[test]
    fn test_append_without_draft_is_invalid() {
        let mut acc = SessionAccumulator::new();
        assert!(matches!(
            acc.append(&[Sample::new(0, 1.0)]),
            Err(MonitorError::InvalidState(_))
        ));
    }

    #[test]
    fn test_reopen_after_close() {
        let mut acc = SessionAccumulator::new();
        acc.open(0).unwrap();
        acc.close(1).unwrap();
        acc.open(2).unwrap();
        assert!(acc.samples().is_empty());
        assert_eq!(acc.start_time(), Some(2));
    }

    #[test]
    fn test_discard_reports_lost_samples() {
        let mut acc = SessionAccumulator::new();
        assert_eq!(acc.discard(), 0);
        acc.open(0).unwrap();
        acc.append(&[Sample::new(1, 1.0), Sample::new(2, 2.0)]).unwrap();
        assert_eq!(acc.discard(), 2);
        assert!(!acc.is_open());
    }
}
