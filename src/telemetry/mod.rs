//! # Telemetry Module
//!
//! RPM samples and the streaming interface they arrive through.
//!
//! This module handles:
//! - The `Sample` reading type
//! - Subscribing to a device's sample stream (backlog, then live pushes)
//! - Cancelling a subscription
//! - Projecting the live chart window from a sample log

pub mod sample;
pub mod stream;
pub mod window;

pub use sample::Sample;
pub use stream::{select_backlog, StreamEvent, Subscription, TelemetrySource};
pub use window::{last_n, LIVE_WINDOW_SIZE};
