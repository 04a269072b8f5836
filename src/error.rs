//! # Error Types
//!
//! Custom error types for Tachometer Monitor using `thiserror`.

use thiserror::Error;

/// Main error type for Tachometer Monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Device existence check did not settle in time
    #[error("Verification timed out after {0} ms. Please check your network connection.")]
    VerificationTimeout(u64),

    /// Transport failure while issuing a command or check
    #[error("Communication error: {0}")]
    Communication(String),

    /// Device ID is unknown upstream
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Device ID failed local validation
    #[error("Invalid device ID: {0}")]
    InvalidDeviceId(String),

    /// Operation requires a selected device
    #[error("No device selected")]
    NoDeviceSelected,

    /// A power toggle is still outstanding
    #[error("A power toggle is already in flight")]
    ToggleInFlight,

    /// Contract violation (e.g. closing a session that was never opened)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// No finalized session with the given ID
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Session history (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV export errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The monitor task is no longer running
    #[error("Monitor task has stopped")]
    MonitorStopped,
}

impl MonitorError {
    /// Whether the error should be shown to the user and the action retried.
    ///
    /// Logic errors and local persistence failures are not user-facing.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            MonitorError::VerificationTimeout(_)
                | MonitorError::Communication(_)
                | MonitorError::DeviceNotFound(_)
                | MonitorError::InvalidDeviceId(_)
        )
    }
}

/// Result type alias for Tachometer Monitor
pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_classification() {
        assert!(MonitorError::VerificationTimeout(5000).is_user_facing());
        assert!(MonitorError::Communication("offline".into()).is_user_facing());
        assert!(!MonitorError::InvalidState("no draft".into()).is_user_facing());
        assert!(!MonitorError::MonitorStopped.is_user_facing());
    }

    #[test]
    fn test_timeout_message_mentions_duration() {
        let msg = MonitorError::VerificationTimeout(5000).to_string();
        assert!(msg.contains("5000 ms"));
    }
}
