//! # Tachometer Monitor
//!
//! Runs one monitoring session against a simulated tachometer.
//!
//! The device is selected and powered on, its telemetry is recorded until the
//! run duration elapses (or Ctrl+C), then it is powered off and the finished
//! session is stored and exported as CSV.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::{interval, sleep, Duration};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use tachometer_monitor::config::{Config, LoggingConfig};
use tachometer_monitor::device::simulated::{SimulatedDevice, SimulatorSettings};
use tachometer_monitor::monitor::{DashboardSnapshot, Monitor, MonitorSettings};
use tachometer_monitor::session::format_duration;
use tachometer_monitor::storage::{FileBackend, SessionStore};

/// Configuration used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Log file name prefix inside the log directory
const LOG_FILE_PREFIX: &str = "tachometer-monitor.log";

/// Main entry point for the Tachometer Monitor application
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration and set up logging
///    - Open the session history
///    - Start the simulated device and the monitor
///
/// 2. **Main Loop**
///    - Log a status line every `status_interval_ms`
///    - Stop after `run_duration_s` or on Ctrl+C
///
/// 3. **Shutdown**
///    - Power the device off, recording the session
///    - Export the newest session when enabled
///
/// # Errors
///
/// Returns error if the configuration is invalid or the device cannot be
/// selected or powered on.
///
/// # Examples
///
/// ```bash
/// cargo run --release -- config/default.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    let _log_guard = init_logging(&config.logging)?;

    info!("Tachometer Monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let store = SessionStore::open(Box::new(FileBackend::new(&config.storage.path)));
    info!(
        "Session history at {} ({} session(s))",
        config.storage.path,
        store.len()
    );

    let device = Arc::new(SimulatedDevice::new(
        config.device.id.clone(),
        simulator_settings(&config),
    ));
    let (monitor, task) = Monitor::spawn(
        device.clone(),
        device,
        store,
        MonitorSettings::from(&config),
    );

    monitor
        .select_device(&config.device.id)
        .await
        .with_context(|| format!("Failed to select device {}", config.device.id))?;
    monitor.turn_on().await.context("Failed to power on device")?;

    let mut status_interval = interval(Duration::from_millis(config.session.status_interval_ms));
    let run_for = sleep(Duration::from_secs(config.simulator.run_duration_s));
    tokio::pin!(run_for);

    info!("Recording for up to {}s", config.simulator.run_duration_s);
    info!("Press Ctrl+C to stop early");

    loop {
        tokio::select! {
            _ = status_interval.tick() => {
                let snapshot = monitor.snapshot().await?;
                info!("{}", status_line(&snapshot));
            }

            _ = &mut run_for => {
                info!("Run duration reached");
                break;
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    if let Err(e) = monitor.turn_off().await {
        warn!("Failed to power off device: {}", e);
    }

    let history = monitor.history().await?;
    match history.first() {
        Some(latest) => {
            info!(
                "Latest session {}: {} samples over {}, avg {} / max {} / min {} rpm",
                latest.id,
                latest.sample_count(),
                format_duration(latest.duration),
                latest.avg_rpm,
                latest.max_rpm,
                latest.min_rpm
            );
            if config.export.enabled {
                let path = monitor.export_session(&latest.id, &config.export.dir).await?;
                info!("Exported session to {}", path.display());
            }
        }
        None => info!("No sessions recorded"),
    }

    monitor.shutdown().await?;
    task.await?;

    Ok(())
}

/// Loads the config named on the command line, then the default file, then
/// built-in defaults.
fn load_config() -> Result<Config> {
    if let Some(path) = std::env::args().nth(1) {
        return Config::load(&path).with_context(|| format!("Failed to load config {}", path));
    }
    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        return Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load config {}", DEFAULT_CONFIG_PATH));
    }
    Ok(Config::default())
}

/// Sets up the tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. With a log directory the output
/// goes to a daily rolling file; the returned guard must be held until exit.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    match &logging.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            Ok(None)
        }
    }
}

fn simulator_settings(config: &Config) -> SimulatorSettings {
    SimulatorSettings {
        sample_interval: Duration::from_millis(config.simulator.sample_interval_ms),
        base_rpm: config.simulator.base_rpm,
        amplitude_rpm: config.simulator.amplitude_rpm,
        backlog_limit: config.stream.backlog_limit,
        channel_capacity: config.stream.channel_capacity,
    }
}

fn status_line(snapshot: &DashboardSnapshot) -> String {
    let mut line = format!(
        "{:?}/{:?}: {} rpm (avg {}, max {}), {} sample(s) in session, {} in history",
        snapshot.power,
        snapshot.connection,
        snapshot.live_stats.current_rpm,
        snapshot.live_stats.avg_rpm,
        snapshot.live_stats.max_rpm,
        snapshot.draft_samples,
        snapshot.history_len
    );
    if let Some(error) = &snapshot.error {
        line.push_str(&format!(" [{}]", error));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulator_settings_from_config() {
        let mut config = Config::default();
        config.simulator.sample_interval_ms = 250;
        config.stream.backlog_limit = 10;

        let settings = simulator_settings(&config);
        assert_eq!(settings.sample_interval, Duration::from_millis(250));
        assert_eq!(settings.backlog_limit, 10);
        assert_eq!(settings.base_rpm, config.simulator.base_rpm);
    }

    #[test]
    fn test_status_line_idle() {
        let line = status_line(&DashboardSnapshot::default());
        assert!(line.starts_with("Off/Disconnected: 0 rpm"));
        assert!(!line.contains('['));
    }

    #[test]
    fn test_status_line_shows_error() {
        let snapshot = DashboardSnapshot {
            error: Some("Failed to toggle device power. Please try again.".to_string()),
            ..DashboardSnapshot::default()
        };
        assert!(status_line(&snapshot).ends_with("[Failed to toggle device power. Please try again.]"));
    }

    #[test]
    fn test_default_config_path_is_bundled() {
        assert!(Path::new(env!("CARGO_MANIFEST_DIR")).join(DEFAULT_CONFIG_PATH).exists());
    }
}
