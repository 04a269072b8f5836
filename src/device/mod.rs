//! # Device Module
//!
//! Remote operations on the tachometer device.
//!
//! This module handles:
//! - Checking that a device ID exists upstream (bounded by a timeout)
//! - Issuing power on/off commands
//! - A simulated device for running without hardware

pub mod simulated;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{MonitorError, Result};

pub use simulated::SimulatedDevice;

/// Default bound on device existence checks.
pub const DEFAULT_VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Remote commands understood by the device.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Whether a device with this ID is registered
    async fn exists(&self, device_id: &str) -> Result<bool>;

    /// Switches the device on or off
    async fn set_power(&self, device_id: &str, on: bool) -> Result<()>;
}

/// Checks that `device_id` exists, giving up after `timeout`.
///
/// # Errors
///
/// - `VerificationTimeout` if the check does not settle in time
/// - `Communication` (or whatever the link reports) on transport failure
pub async fn verify_device(link: &dyn DeviceLink, device_id: &str, timeout: Duration) -> Result<bool> {
    debug!("Checking for existence of device: {}", device_id);

    match tokio::time::timeout(timeout, link.exists(device_id)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Verification of {} timed out after {:?}", device_id, timeout);
            Err(MonitorError::VerificationTimeout(timeout.as_millis() as u64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_verify_existing_device() {
        let mut link = MockDeviceLink::new();
        link.expect_exists()
            .withf(|id| id == "tacho-1")
            .times(1)
            .returning(|_| Ok(true));

        assert!(verify_device(&link, "tacho-1", DEFAULT_VERIFY_TIMEOUT).await.unwrap());
    }

    #[tokio::test]
    async fn test_verify_propagates_transport_error() {
        let mut link = MockDeviceLink::new();
        link.expect_exists()
            .returning(|_| Err(MonitorError::Communication("offline".into())));

        let result = verify_device(&link, "tacho-1", DEFAULT_VERIFY_TIMEOUT).await;
        assert!(matches!(result, Err(MonitorError::Communication(_))));
    }

    #[test]
    fn test_verify_unknown_device() {
        let mut link = MockDeviceLink::new();
        link.expect_exists().returning(|_| Ok(false));

        let found = tokio_test::assert_ok!(tokio_test::block_on(verify_device(
            &link,
            "tacho-9",
            DEFAULT_VERIFY_TIMEOUT
        )));
        assert!(!found);
    }

    struct StalledLink;

    #[async_trait]
    impl DeviceLink for StalledLink {
        async fn exists(&self, _device_id: &str) -> Result<bool> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(true)
        }

        async fn set_power(&self, _device_id: &str, _on: bool) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_times_out() {
        let result = verify_device(&StalledLink, "tacho-1", DEFAULT_VERIFY_TIMEOUT).await;
        assert!(matches!(result, Err(MonitorError::VerificationTimeout(5000))));
    }
}
