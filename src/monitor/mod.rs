//! # Monitor Module
//!
//! Coordinates device power commands with the telemetry stream and session
//! boundaries.
//!
//! This module handles:
//! - Verifying and selecting a device
//! - Power on/off with a single in-flight toggle at a time
//! - Opening a draft session on power-on and finalizing it on power-off
//! - Feeding stream batches into the draft and the live window
//! - Session history operations (delete, clear, compare, export)
//!
//! All state is owned by one task. Callers talk to it through a
//! [`MonitorHandle`]; remote power commands run on their own tasks and report
//! back, so stream batches keep flowing while a command is outstanding.

pub mod handle;
pub mod state;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::device::{verify_device, DeviceLink};
use crate::error::{MonitorError, Result};
use crate::session::{compare, rpm_distribution, LiveStats, SessionAccumulator};
use crate::storage::SessionStore;
use crate::telemetry::{last_n, Sample, StreamEvent, Subscription, TelemetrySource};

pub use handle::MonitorHandle;
use handle::Command;
pub use state::{
    ConnectionStatus, DashboardSnapshot, MonitorSettings, PowerState, ToggleOutcome,
    TransientError, TOGGLE_FAILED_MESSAGE,
};

/// Queue depth for caller commands
const COMMAND_CAPACITY: usize = 32;

/// The toggle currently awaiting its remote command
struct PendingToggle {
    on: bool,
    reply: oneshot::Sender<Result<ToggleOutcome>>,
}

/// Power/connection state machine for one selected device.
pub struct Monitor {
    device: Arc<dyn DeviceLink>,
    telemetry: Arc<dyn TelemetrySource>,
    store: SessionStore,
    settings: MonitorSettings,

    device_id: Option<String>,
    power: PowerState,
    connection: ConnectionStatus,
    /// In-flight flag: set while a power command is outstanding
    toggle: Option<PendingToggle>,
    accumulator: SessionAccumulator,
    live_window: Vec<Sample>,
    subscription: Option<Subscription>,
    last_error: Option<TransientError>,

    completions: mpsc::UnboundedSender<Result<()>>,
}

impl Monitor {
    /// Starts the monitor task.
    ///
    /// # Returns
    ///
    /// * `(MonitorHandle, JoinHandle<()>)` - Handle for callers and the task itself
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use tachometer_monitor::device::simulated::{SimulatedDevice, SimulatorSettings};
    /// use tachometer_monitor::monitor::{Monitor, MonitorSettings};
    /// use tachometer_monitor::storage::{MemoryBackend, SessionStore};
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let device = Arc::new(SimulatedDevice::new("tacho-001", SimulatorSettings::default()));
    ///     let store = SessionStore::open(Box::new(MemoryBackend::new()));
    ///     let (monitor, task) = Monitor::spawn(device.clone(), device, store, MonitorSettings::default());
    ///
    ///     monitor.select_device("tacho-001").await?;
    ///     monitor.turn_on().await?;
    ///     monitor.turn_off().await?;
    ///     monitor.shutdown().await?;
    ///     task.await?;
    ///     Ok(())
    /// }
    /// ```
    pub fn spawn(
        device: Arc<dyn DeviceLink>,
        telemetry: Arc<dyn TelemetrySource>,
        store: SessionStore,
        settings: MonitorSettings,
    ) -> (MonitorHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let monitor = Self {
            device,
            telemetry,
            store,
            settings,
            device_id: None,
            power: PowerState::Off,
            connection: ConnectionStatus::Disconnected,
            toggle: None,
            accumulator: SessionAccumulator::new(),
            live_window: Vec::new(),
            subscription: None,
            last_error: None,
            completions: completion_tx,
        };

        let task = tokio::spawn(monitor.run(command_rx, completion_rx));
        (MonitorHandle::new(command_tx), task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut completions: mpsc::UnboundedReceiver<Result<()>>,
    ) {
        info!("Monitor started ({} session(s) in history)", self.store.len());

        loop {
            tokio::select! {
                biased;

                Some(result) = completions.recv() => self.finish_toggle(result),

                event = next_stream_event(&mut self.subscription) => self.handle_stream_event(event),

                command = commands.recv() => {
                    let keep_running = match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            self.shutdown();
                            false
                        }
                    };
                    if !keep_running {
                        break;
                    }
                }
            }
        }

        info!("Monitor stopped");
    }

    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::SelectDevice { device_id, reply } => {
                let result = self.select_device(&device_id).await;
                let _ = reply.send(result);
            }
            Command::SetPower { on, reply } => self.request_power(on, reply),
            Command::ChangeDevice { reply } => {
                let result = self.change_device().await;
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::History { reply } => {
                let _ = reply.send(self.store.sessions().to_vec());
            }
            Command::DeleteSession { id, reply } => {
                let _ = reply.send(self.store.remove(&id));
            }
            Command::ClearHistory { reply } => {
                let _ = reply.send(self.store.clear());
            }
            Command::Compare { ids, reply } => {
                let _ = reply.send(compare(self.store.sessions(), &ids));
            }
            Command::Shutdown { reply } => {
                self.shutdown();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn select_device(&mut self, raw_id: &str) -> Result<()> {
        let device_id = raw_id.trim();
        if device_id.is_empty() {
            return Err(MonitorError::InvalidDeviceId(
                "Device ID cannot be empty. Please enter a valid ID.".to_string(),
            ));
        }
        if self.toggle.is_some() {
            return Err(MonitorError::ToggleInFlight);
        }

        // The current device stays selected until the new one checks out
        if !verify_device(self.device.as_ref(), device_id, self.settings.verify_timeout).await? {
            return Err(MonitorError::DeviceNotFound(device_id.to_string()));
        }

        // With nothing selected the per-device state is already clear
        self.change_device().await?;
        self.device_id = Some(device_id.to_string());
        info!("Selected device {}", device_id);
        Ok(())
    }

    fn request_power(&mut self, on: bool, reply: oneshot::Sender<Result<ToggleOutcome>>) {
        let Some(device_id) = self.device_id.clone() else {
            let _ = reply.send(Err(MonitorError::NoDeviceSelected));
            return;
        };

        if self.toggle.is_some() {
            debug!("Power toggle already in flight, ignoring request");
            let _ = reply.send(Ok(ToggleOutcome::Busy));
            return;
        }

        if (self.power == PowerState::On) == on {
            let _ = reply.send(Ok(ToggleOutcome::Unchanged));
            return;
        }

        self.last_error = None;
        self.toggle = Some(PendingToggle { on, reply });

        let device = Arc::clone(&self.device);
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let result = device.set_power(&device_id, on).await;
            // The monitor may already be gone
            let _ = completions.send(result);
        });
    }

    fn finish_toggle(&mut self, result: Result<()>) {
        let Some(pending) = self.toggle.take() else {
            warn!("Power command settled with no toggle in flight");
            return;
        };

        let outcome = match result {
            Ok(()) => {
                if pending.on {
                    self.apply_power_on();
                } else {
                    self.apply_power_off();
                }
                Ok(ToggleOutcome::Applied)
            }
            Err(e) => {
                self.report_toggle_failure(&e);
                Err(e)
            }
        };

        let _ = pending.reply.send(outcome);
    }

    fn apply_power_on(&mut self) {
        let stale = self.accumulator.discard();
        if stale > 0 {
            warn!("Discarded a stale draft with {} sample(s)", stale);
        }

        if let Err(e) = self.accumulator.open(now_millis()) {
            error!("Could not open session: {}", e);
        }
        self.live_window.clear();
        self.power = PowerState::On;
        self.connection = ConnectionStatus::Connecting;

        if let Some(previous) = self.subscription.take() {
            previous.unsubscribe();
        }
        if let Some(device_id) = &self.device_id {
            self.subscription = Some(self.telemetry.subscribe(device_id));
            info!("Device {} on, waiting for telemetry", device_id);
        }
    }

    fn apply_power_off(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }

        match self.accumulator.close(now_millis()) {
            Ok(Some(session)) => {
                info!(
                    "Session {} finished: {} samples over {}s, avg {} rpm",
                    session.id,
                    session.sample_count(),
                    session.duration,
                    session.avg_rpm
                );
                if let Err(e) = self.store.append(session) {
                    error!("Failed to persist session: {}", e);
                }
            }
            Ok(None) => info!("Session too short to record, discarded"),
            Err(e) => error!("Could not close session: {}", e),
        }

        self.live_window.clear();
        self.power = PowerState::Off;
        self.connection = ConnectionStatus::Disconnected;
    }

    fn handle_stream_event(&mut self, event: Option<StreamEvent>) {
        match event {
            Some(StreamEvent::Batch(samples)) => self.ingest(samples),
            Some(StreamEvent::Error(message)) => {
                warn!("Telemetry read error: {}", message);
                if self.power == PowerState::On {
                    self.connection = ConnectionStatus::Disconnected;
                }
            }
            None => {
                warn!("Telemetry stream ended");
                self.subscription = None;
                if self.power == PowerState::On {
                    self.connection = ConnectionStatus::Disconnected;
                }
            }
        }
    }

    fn ingest(&mut self, samples: Vec<Sample>) {
        if self.power != PowerState::On {
            debug!("Ignoring {} sample(s) while the device is off", samples.len());
            return;
        }

        if self.connection != ConnectionStatus::Connected {
            info!("Telemetry connected");
            self.connection = ConnectionStatus::Connected;
        }

        if let Err(e) = self.accumulator.append(&samples) {
            error!("Dropping batch of {} sample(s): {}", samples.len(), e);
            return;
        }

        self.live_window = last_n(self.accumulator.samples(), self.settings.live_window_size).to_vec();
        debug!(
            "Ingested {} sample(s), draft now {}",
            samples.len(),
            self.accumulator.samples().len()
        );
    }

    async fn change_device(&mut self) -> Result<()> {
        if self.toggle.is_some() {
            return Err(MonitorError::ToggleInFlight);
        }
        let Some(device_id) = self.device_id.clone() else {
            return Ok(());
        };

        let mut power_off_error = None;
        if self.power == PowerState::On {
            match self.device.set_power(&device_id, false).await {
                Ok(()) => self.apply_power_off(),
                Err(e) => power_off_error = Some(e),
            }
        }

        self.teardown();
        if let Some(e) = power_off_error {
            self.report_toggle_failure(&e);
        }
        info!("Deselected device {}", device_id);
        Ok(())
    }

    /// Drops every piece of per-device state.
    fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        let lost = self.accumulator.discard();
        if lost > 0 {
            warn!("Discarded unfinished session with {} sample(s)", lost);
        }
        self.live_window.clear();
        self.power = PowerState::Off;
        self.connection = ConnectionStatus::Disconnected;
        self.device_id = None;
        self.last_error = None;
    }

    fn shutdown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        let lost = self.accumulator.discard();
        if lost > 0 {
            warn!("Shutting down with an unfinished session of {} sample(s)", lost);
        }
    }

    /// Logs a failed power command and, when the user can act on it, shows
    /// the retry message.
    fn report_toggle_failure(&mut self, e: &MonitorError) {
        if e.is_user_facing() {
            warn!("Failed to set device power state: {}", e);
            self.raise_error(state::TOGGLE_FAILED_MESSAGE);
        } else {
            error!("Power command failed: {}", e);
        }
    }

    fn raise_error(&mut self, message: &str) {
        self.last_error = Some(TransientError::new(
            message,
            Instant::now(),
            self.settings.error_display,
        ));
    }

    fn snapshot(&self) -> DashboardSnapshot {
        let draft = self.accumulator.samples();
        DashboardSnapshot {
            device_id: self.device_id.clone(),
            power: self.power,
            connection: self.connection,
            toggling: self.toggle.is_some(),
            live_window: self.live_window.clone(),
            live_stats: LiveStats::compute(draft, &self.live_window, self.power == PowerState::On),
            distribution: rpm_distribution(draft),
            draft_samples: draft.len(),
            history_len: self.store.len(),
            error: self
                .last_error
                .as_ref()
                .and_then(|e| e.visible_at(Instant::now()))
                .map(str::to_string),
        }
    }
}

async fn next_stream_event(subscription: &mut Option<Subscription>) -> Option<StreamEvent> {
    match subscription {
        Some(subscription) => subscription.next_event().await,
        None => std::future::pending().await,
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
