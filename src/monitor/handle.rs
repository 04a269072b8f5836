//! Caller-side handle to the monitor task.
//!
//! Every method sends one command and waits for the monitor's reply, so
//! callers observe each operation either fully applied or not at all.

use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, oneshot};

use super::state::{DashboardSnapshot, ToggleOutcome};
use crate::error::{MonitorError, Result};
use crate::session::{write_csv, ComparisonSet, Session};

pub(crate) enum Command {
    SelectDevice {
        device_id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    SetPower {
        on: bool,
        reply: oneshot::Sender<Result<ToggleOutcome>>,
    },
    ChangeDevice {
        reply: oneshot::Sender<Result<()>>,
    },
    Snapshot {
        reply: oneshot::Sender<DashboardSnapshot>,
    },
    History {
        reply: oneshot::Sender<Vec<Session>>,
    },
    DeleteSession {
        id: String,
        reply: oneshot::Sender<Result<()>>,
    },
    ClearHistory {
        reply: oneshot::Sender<Result<()>>,
    },
    Compare {
        ids: Vec<String>,
        reply: oneshot::Sender<ComparisonSet>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle for driving a running [`Monitor`](super::Monitor).
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<Command>,
}

impl MonitorHandle {
    pub(crate) fn new(commands: mpsc::Sender<Command>) -> Self {
        Self { commands }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| MonitorError::MonitorStopped)?;
        response.await.map_err(|_| MonitorError::MonitorStopped)
    }

    /// Verifies and selects a device, replacing any current selection.
    ///
    /// # Errors
    ///
    /// `InvalidDeviceId`, `VerificationTimeout`, `Communication`,
    /// `DeviceNotFound`, or `ToggleInFlight`.
    pub async fn select_device(&self, device_id: &str) -> Result<()> {
        self.request(|reply| Command::SelectDevice {
            device_id: device_id.to_string(),
            reply,
        })
        .await?
    }

    /// Powers the selected device on and starts a new session.
    pub async fn turn_on(&self) -> Result<ToggleOutcome> {
        self.set_power(true).await
    }

    /// Powers the selected device off and records the session.
    pub async fn turn_off(&self) -> Result<ToggleOutcome> {
        self.set_power(false).await
    }

    /// Requests a power state. Resolves once the remote command settles.
    pub async fn set_power(&self, on: bool) -> Result<ToggleOutcome> {
        self.request(|reply| Command::SetPower { on, reply }).await?
    }

    /// Deselects the current device, powering it off first if needed.
    pub async fn change_device(&self) -> Result<()> {
        self.request(|reply| Command::ChangeDevice { reply }).await?
    }

    pub async fn snapshot(&self) -> Result<DashboardSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Finalized sessions, newest first
    pub async fn history(&self) -> Result<Vec<Session>> {
        self.request(|reply| Command::History { reply }).await
    }

    pub async fn delete_session(&self, id: &str) -> Result<()> {
        self.request(|reply| Command::DeleteSession {
            id: id.to_string(),
            reply,
        })
        .await?
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.request(|reply| Command::ClearHistory { reply }).await?
    }

    /// Time-normalized overlay of the selected sessions
    pub async fn compare(&self, ids: &[String]) -> Result<ComparisonSet> {
        self.request(|reply| Command::Compare {
            ids: ids.to_vec(),
            reply,
        })
        .await
    }

    /// Writes one session as CSV into `dir` and returns the file path.
    ///
    /// # Errors
    ///
    /// `SessionNotFound` if the ID is not in history, or the export error.
    pub async fn export_session<P: AsRef<Path>>(&self, id: &str, dir: P) -> Result<PathBuf> {
        let history = self.history().await?;
        let session = history
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| MonitorError::SessionNotFound(id.to_string()))?;
        write_csv(session, dir)
    }

    /// Stops the monitor, cancelling any active stream.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }
}
