//! # CSV Export
//!
//! Flat-file export of a finalized session:
//!
//! ```text
//! Timestamp,RPM
//! 2023-11-14T22:13:20.000Z,250
//! ```
//!
//! Rows are separated by `\n` with no trailing newline. Files are named
//! `tachometer-session-<YYYY-MM-DD>.csv` after the session's UTC start date.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::info;

use super::record::Session;
use crate::error::{MonitorError, Result};

/// Column headers of the export
pub const CSV_HEADERS: [&str; 2] = ["Timestamp", "RPM"];

/// Renders a session as CSV text.
///
/// # Errors
///
/// Returns `InvalidState` if a sample timestamp cannot be represented as a
/// calendar date, or a CSV error if writing fails.
///
/// # Examples
///
/// ```
/// use tachometer_monitor::session::{to_csv, Session};
/// use tachometer_monitor::telemetry::Sample;
///
/// let data = vec![Sample::new(1_700_000_000_000, 250.0), Sample::new(1_700_000_001_000, 260.0)];
/// let session = Session::finalize(1_700_000_000_000, 1_700_000_002_000, data).unwrap();
/// let csv = to_csv(&session)?;
/// assert!(csv.starts_with("Timestamp,RPM\n2023-11-14T22:13:20.000Z,250\n"));
/// # Ok::<(), tachometer_monitor::error::MonitorError>(())
/// ```
pub fn to_csv(session: &Session) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADERS)?;
    for sample in &session.data {
        let timestamp = sample.iso_timestamp().ok_or_else(|| {
            MonitorError::InvalidState(format!("timestamp {} out of range", sample.timestamp))
        })?;
        writer.write_record([timestamp, sample.rpm.to_string()])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| MonitorError::Io(e.into_error()))?;
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_end_matches('\n').to_string())
}

/// File name for a session export, from its UTC start date.
pub fn export_filename(session: &Session) -> String {
    let date = DateTime::<Utc>::from_timestamp_millis(session.start_time)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown-date".to_string());
    format!("tachometer-session-{}.csv", date)
}

/// Writes a session export into `dir`, creating it if needed.
///
/// # Returns
///
/// * `Result<PathBuf>` - Path of the written file
pub fn write_csv<P: AsRef<Path>>(session: &Session, dir: P) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let path = dir.join(export_filename(session));
    fs::write(&path, to_csv(session)?)?;

    info!("Exported session {} to {}", session.id, path.display());
    Ok(path)
}
