//! Trait abstraction for durable key-value persistence to enable testing

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{MonitorError, Result};

/// Raw storage of the serialized session history.
pub trait SessionBackend: Send {
    /// Reads the stored blob, `None` if nothing has been saved yet
    fn load(&self) -> Result<Option<String>>;

    /// Replaces the stored blob
    fn save(&mut self, blob: &str) -> Result<()>;

    /// Deletes the stored blob
    fn remove(&mut self) -> Result<()>;
}

/// Stores the blob in a single file.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// target, so a reader never sees a half-written history.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionBackend for FileBackend {
    fn load(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MonitorError::Io(e)),
        }
    }

    fn save(&mut self, blob: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        fs::write(&temp, blob)?;
        fs::rename(&temp, &self.path)?;
        debug!("Saved session history ({} bytes) to {}", blob.len(), self.path.display());
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MonitorError::Io(e)),
        }
    }
}

/// In-memory backend. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    blob: Arc<Mutex<Option<String>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-loaded with `blob`
    pub fn with_blob(blob: impl Into<String>) -> Self {
        let backend = Self::default();
        *backend.slot() = Some(blob.into());
        backend
    }

    /// Current stored blob
    pub fn blob(&self) -> Option<String> {
        self.slot().clone()
    }

    /// Makes subsequent `save` calls fail
    pub fn set_fail_writes(&self, fail: bool) {
        *self
            .fail_writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = fail;
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.blob
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn writes_fail(&self) -> bool {
        *self
            .fail_writes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionBackend for MemoryBackend {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.blob())
    }

    fn save(&mut self, blob: &str) -> Result<()> {
        if self.writes_fail() {
            return Err(MonitorError::Io(io::Error::new(
                io::ErrorKind::Other,
                "storage unavailable",
            )));
        }
        *self.slot() = Some(blob.to_string());
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_backend_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("sessions.json"));
        assert_eq!(backend.load().unwrap(), None);
    }

    #[test]
    fn test_file_backend_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path().join("nested").join("sessions.json"));

        backend.save("[]").unwrap();
        assert_eq!(backend.load().unwrap().as_deref(), Some("[]"));

        backend.save("[1]").unwrap();
        assert_eq!(backend.load().unwrap().as_deref(), Some("[1]"));
        assert!(!backend.temp_path().exists());
    }

    #[test]
    fn test_file_backend_remove() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = FileBackend::new(dir.path().join("sessions.json"));
        backend.save("{}").unwrap();
        backend.remove().unwrap();
        assert_eq!(backend.load().unwrap(), None);

        // Removing twice is fine
        backend.remove().unwrap();
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let backend = FileBackend::new("/var/lib/tacho/sessions.json");
        assert_eq!(backend.temp_path(), PathBuf::from("/var/lib/tacho/sessions.json.tmp"));
    }

    #[test]
    fn test_memory_backend_shared_between_clones() {
        let backend = MemoryBackend::new();
        let mut writer = backend.clone();
        writer.save("abc").unwrap();
        assert_eq!(backend.blob().as_deref(), Some("abc"));
    }

    #[test]
    fn test_memory_backend_write_failure() {
        let mut backend = MemoryBackend::with_blob("old");
        backend.set_fail_writes(true);
        assert!(backend.save("new").is_err());
        assert_eq!(backend.blob().as_deref(), Some("old"));
    }
}
