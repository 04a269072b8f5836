//! # Monitor State
//!
//! Device power and stream connection states, plus what the dashboard reads.
//!
//! Valid combinations:
//!
//! | Power | Connection | Meaning |
//! |-------|------------|---------|
//! | Off | Disconnected | Idle |
//! | On | Connecting | Subscribed, no samples yet |
//! | On | Connected | Samples flowing |
//! | On | Disconnected | Stream failed or ended while the device is on |

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::Config;
use crate::session::{LiveStats, RpmBin};
use crate::telemetry::{Sample, LIVE_WINDOW_SIZE};

/// Message shown when a power command fails
pub const TOGGLE_FAILED_MESSAGE: &str = "Failed to toggle device power. Please try again.";

/// Device power flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerState {
    #[default]
    Off,
    On,
}

/// Telemetry stream status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Result of a power toggle request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The command succeeded and the transition was applied
    Applied,
    /// Another toggle is still in flight; nothing was done
    Busy,
    /// The device is already in the requested state
    Unchanged,
}

/// Runtime settings of the monitor.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub verify_timeout: Duration,
    pub error_display: Duration,
    pub live_window_size: usize,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            verify_timeout: crate::device::DEFAULT_VERIFY_TIMEOUT,
            error_display: Duration::from_secs(5),
            live_window_size: LIVE_WINDOW_SIZE,
        }
    }
}

impl From<&Config> for MonitorSettings {
    fn from(config: &Config) -> Self {
        Self {
            verify_timeout: config.verify_timeout(),
            error_display: config.error_display(),
            live_window_size: config.session.live_window_size,
        }
    }
}

/// A user-facing error that disappears on its own.
#[derive(Debug, Clone)]
pub struct TransientError {
    message: String,
    raised_at: Instant,
    lifetime: Duration,
}

impl TransientError {
    pub fn new(message: impl Into<String>, raised_at: Instant, lifetime: Duration) -> Self {
        Self {
            message: message.into(),
            raised_at,
            lifetime,
        }
    }

    /// The message, if it has not yet expired at `now`
    pub fn visible_at(&self, now: Instant) -> Option<&str> {
        if now.saturating_duration_since(self.raised_at) < self.lifetime {
            Some(&self.message)
        } else {
            None
        }
    }
}

/// Point-in-time view of the monitor for rendering.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSnapshot {
    pub device_id: Option<String>,
    pub power: PowerState,
    pub connection: ConnectionStatus,
    /// A power command is outstanding
    pub toggling: bool,
    pub live_window: Vec<Sample>,
    pub live_stats: LiveStats,
    pub distribution: Vec<RpmBin>,
    /// Samples in the draft session
    pub draft_samples: usize,
    /// Finalized sessions in history
    pub history_len: usize,
    pub error: Option<String>,
}

impl DashboardSnapshot {
    pub fn is_on(&self) -> bool {
        self.power == PowerState::On
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Instant {
        Instant::from_std(std::time::Instant::now())
    }

    #[test]
    fn test_transient_error_visible_within_lifetime() {
        let t0 = base();
        let err = TransientError::new("boom", t0, Duration::from_secs(5));
        assert_eq!(err.visible_at(t0), Some("boom"));
        assert_eq!(err.visible_at(t0 + Duration::from_millis(4999)), Some("boom"));
    }

    #[test]
    fn test_transient_error_expires() {
        let t0 = base();
        let err = TransientError::new("boom", t0, Duration::from_secs(5));
        assert_eq!(err.visible_at(t0 + Duration::from_secs(5)), None);
        assert_eq!(err.visible_at(t0 + Duration::from_secs(60)), None);
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.session.live_window_size = 10;
        config.device.verify_timeout_ms = 1500;

        let settings = MonitorSettings::from(&config);
        assert_eq!(settings.live_window_size, 10);
        assert_eq!(settings.verify_timeout, Duration::from_millis(1500));
        assert_eq!(settings.error_display, Duration::from_secs(5));
    }

    #[test]
    fn test_defaults_are_idle() {
        let snapshot = DashboardSnapshot::default();
        assert!(!snapshot.is_on());
        assert_eq!(snapshot.connection, ConnectionStatus::Disconnected);
    }
}
