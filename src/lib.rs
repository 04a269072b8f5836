//! # Tachometer Monitor Library
//!
//! Monitor a cloud-connected RPM sensor: switch it on and off, watch its
//! telemetry live, and keep a history of finished sessions.
//!
//! This library provides the session engine behind a tachometer dashboard:
//! stream ingestion, session aggregation, persistence, comparison and CSV
//! export.

pub mod config;
pub mod device;
pub mod error;
pub mod monitor;
pub mod session;
pub mod storage;
pub mod telemetry;
