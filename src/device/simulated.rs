//! # Simulated Tachometer
//!
//! Stands in for the cloud-connected sensor so the monitor can run without
//! hardware. While powered it produces one sample per interval, following a
//! slow sine wave around a base RPM, and keeps every sample in a shared log
//! the way the upstream store does.
//!
//! Subscribers get the most recent samples as a sorted backlog first, then
//! live samples newer than the last backlog timestamp.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::DeviceLink;
use crate::error::{MonitorError, Result};
use crate::telemetry::stream::DEFAULT_BACKLOG_LIMIT;
use crate::telemetry::{select_backlog, Sample, StreamEvent, Subscription, TelemetrySource};

/// Phase advance of the RPM wave per sample, in radians
const PHASE_STEP: f64 = 0.3;

/// Tunables of the simulated device.
#[derive(Debug, Clone)]
pub struct SimulatorSettings {
    pub sample_interval: Duration,
    pub base_rpm: f64,
    pub amplitude_rpm: f64,
    pub backlog_limit: usize,
    pub channel_capacity: usize,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(500),
            base_rpm: 450.0,
            amplitude_rpm: 250.0,
            backlog_limit: DEFAULT_BACKLOG_LIMIT,
            channel_capacity: 64,
        }
    }
}

struct Inner {
    device_id: String,
    settings: SimulatorSettings,
    log: Mutex<Vec<Sample>>,
    live: broadcast::Sender<Sample>,
    generator: Mutex<Option<JoinHandle<()>>>,
    powered: AtomicBool,
}

impl Inner {
    fn log(&self) -> MutexGuard<'_, Vec<Sample>> {
        self.log.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn generator(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.generator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A single simulated device, reachable under one ID.
#[derive(Clone)]
pub struct SimulatedDevice {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SimulatedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedDevice")
            .field("device_id", &self.inner.device_id)
            .field("powered", &self.is_powered())
            .finish_non_exhaustive()
    }
}

impl SimulatedDevice {
    pub fn new(device_id: impl Into<String>, settings: SimulatorSettings) -> Self {
        let (live, _) = broadcast::channel(settings.channel_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                device_id: device_id.into(),
                settings,
                log: Mutex::new(Vec::new()),
                live,
                generator: Mutex::new(None),
                powered: AtomicBool::new(false),
            }),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    pub fn is_powered(&self) -> bool {
        self.inner.powered.load(Ordering::SeqCst)
    }

    /// Number of samples produced so far
    pub fn recorded(&self) -> usize {
        self.inner.log().len()
    }

    fn check_id(&self, device_id: &str) -> Result<()> {
        if device_id == self.inner.device_id {
            Ok(())
        } else {
            Err(MonitorError::Communication(format!(
                "device {} is not reachable",
                device_id
            )))
        }
    }

    fn start_generator(&self) {
        let mut generator = self.inner.generator();
        if generator.is_some() {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let settings = self.inner.settings.clone();
        *generator = Some(tokio::spawn(async move {
            let interval_ms = settings.sample_interval.as_millis() as i64;
            let started_at = Utc::now().timestamp_millis();
            let mut ticker = tokio::time::interval(settings.sample_interval);
            let mut index: i64 = 0;

            loop {
                ticker.tick().await;
                // Stop once the device itself is gone
                let Some(inner) = weak.upgrade() else { break };

                let phase = index as f64 * PHASE_STEP;
                let rpm = (settings.base_rpm + settings.amplitude_rpm * phase.sin()).max(0.0);
                let sample = Sample::new(started_at + index * interval_ms, rpm.round());

                inner.log().push(sample);
                // No receivers is fine; the sample stays in the log
                let _ = inner.live.send(sample);
                index += 1;
            }
        }));
        debug!("Simulator generator started");
    }

    fn stop_generator(&self) {
        if let Some(handle) = self.inner.generator().take() {
            handle.abort();
            debug!("Simulator generator stopped");
        }
    }
}

#[async_trait]
impl DeviceLink for SimulatedDevice {
    async fn exists(&self, device_id: &str) -> Result<bool> {
        Ok(device_id == self.inner.device_id)
    }

    async fn set_power(&self, device_id: &str, on: bool) -> Result<()> {
        self.check_id(device_id)?;
        info!("Setting device {} power state to: {}", device_id, on);

        self.inner.powered.store(on, Ordering::SeqCst);
        if on {
            self.start_generator();
        } else {
            self.stop_generator();
        }
        Ok(())
    }
}

impl TelemetrySource for SimulatedDevice {
    fn subscribe(&self, device_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(self.inner.settings.channel_capacity.max(1));

        if device_id != self.inner.device_id {
            warn!("No data stream for unknown device {}", device_id);
            return Subscription::new(device_id, rx, None);
        }

        info!("Starting data stream for device: {}", device_id);

        // Subscribe to live samples before taking the backlog so none fall in between
        let mut live = self.inner.live.subscribe();
        let backlog = select_backlog(&self.inner.log(), self.inner.settings.backlog_limit);

        let feeder = tokio::spawn(async move {
            let last_known = backlog.iter().map(|s| s.timestamp).max();

            if !backlog.is_empty() && tx.send(StreamEvent::Batch(backlog)).await.is_err() {
                return;
            }

            loop {
                let event = match live.recv().await {
                    Ok(sample) => {
                        if last_known.is_some_and(|t| sample.timestamp <= t) {
                            continue;
                        }
                        StreamEvent::Batch(vec![sample])
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Data stream lagged, {} sample(s) skipped", skipped);
                        StreamEvent::Error(format!("stream lagged, {} sample(s) skipped", skipped))
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Subscription::new(device_id, rx, Some(feeder))
    }
}
