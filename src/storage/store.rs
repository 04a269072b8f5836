//! # Session Store
//!
//! Repository owning both the cached history and its persistence backend.
//!
//! History is ordered newest first. Every mutation rewrites the whole blob
//! and only then swaps the cache, so a failed write leaves the visible
//! history exactly as it was.

use tracing::{debug, info, warn};

use super::backend::SessionBackend;
use crate::error::Result;
use crate::session::Session;

/// Finalized session history backed by durable storage.
pub struct SessionStore {
    backend: Box<dyn SessionBackend>,
    sessions: Vec<Session>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Opens the store, loading any persisted history.
    ///
    /// A blob that fails to parse is deleted and the history starts empty;
    /// the failure is logged, never returned.
    pub fn open(backend: Box<dyn SessionBackend>) -> Self {
        let mut store = Self {
            backend,
            sessions: Vec::new(),
        };
        store.sessions = store.load();
        store
    }

    /// Re-reads the persisted history, replacing the cache.
    pub fn reload(&mut self) -> &[Session] {
        self.sessions = self.load();
        &self.sessions
    }

    fn load(&mut self) -> Vec<Session> {
        let blob = match self.backend.load() {
            Ok(Some(blob)) => blob,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read session history, starting empty: {}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Session>>(&blob) {
            Ok(sessions) => {
                info!("Loaded {} session(s) from history", sessions.len());
                sessions
            }
            Err(e) => {
                warn!("Session history is corrupt, discarding it: {}", e);
                if let Err(e) = self.backend.remove() {
                    warn!("Failed to remove corrupt session history: {}", e);
                }
                Vec::new()
            }
        }
    }

    /// Persists `sessions` as the complete history.
    ///
    /// # Errors
    ///
    /// Returns the serialization or backend error; the cached history is
    /// unchanged in that case.
    pub fn save_all(&mut self, sessions: Vec<Session>) -> Result<()> {
        let blob = serde_json::to_string(&sessions)?;
        self.backend.save(&blob)?;
        self.sessions = sessions;
        Ok(())
    }

    /// Adds a session as the most recent entry.
    pub fn append(&mut self, session: Session) -> Result<()> {
        let id = session.id.clone();
        let mut updated = Vec::with_capacity(self.sessions.len() + 1);
        updated.push(session);
        updated.extend(self.sessions.iter().cloned());
        self.save_all(updated)?;
        info!("Recorded session {} ({} in history)", id, self.sessions.len());
        Ok(())
    }

    /// Deletes the session with `id`. Unknown IDs leave the history as is.
    pub fn remove(&mut self, id: &str) -> Result<()> {
        let updated: Vec<Session> = self.sessions.iter().filter(|s| s.id != id).cloned().collect();
        let removed = self.sessions.len() - updated.len();
        self.save_all(updated)?;
        if removed == 0 {
            debug!("No session {} to delete", id);
        } else {
            info!("Deleted session {}", id);
        }
        Ok(())
    }

    /// Deletes every session.
    pub fn clear(&mut self) -> Result<()> {
        self.save_all(Vec::new())?;
        info!("Cleared session history");
        Ok(())
    }

    /// History, newest first
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backend::{FileBackend, MemoryBackend};
    use crate::telemetry::Sample;

    fn session(start: i64) -> Session {
        let data = vec![Sample::new(start, 100.0), Sample::new(start + 1000, 200.0)];
        Session::finalize(start, start + 2000, data).unwrap()
    }

    #[test]
    fn test_empty_backend_loads_empty() {
        let store = SessionStore::open(Box::new(MemoryBackend::new()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_append_puts_newest_first() {
        let backend = MemoryBackend::new();
        let mut store = SessionStore::open(Box::new(backend.clone()));
        let a = session(1000);
        let b = session(5000);

        store.append(a.clone()).unwrap();
        store.append(b.clone()).unwrap();

        let reopened = SessionStore::open(Box::new(backend));
        assert_eq!(reopened.sessions(), &[b, a]);
    }

    #[test]
    fn test_append_round_trip_preserves_existing() {
        let backend = MemoryBackend::new();
        let mut store = SessionStore::open(Box::new(backend.clone()));
        store.append(session(1)).unwrap();
        store.append(session(2)).unwrap();
        let before = store.reload().to_vec();

        let s = session(3);
        store.append(s.clone()).unwrap();
        let after = store.reload().to_vec();

        assert_eq!(after[0], s);
        assert_eq!(&after[1..], before.as_slice());
    }

    #[test]
    fn test_remove_by_id() {
        let mut store = SessionStore::open(Box::new(MemoryBackend::new()));
        let a = session(1000);
        let b = session(5000);
        store.append(a.clone()).unwrap();
        store.append(b.clone()).unwrap();

        store.remove(&a.id).unwrap();
        assert_eq!(store.sessions(), &[b]);
    }

    #[test]
    fn test_remove_unknown_id_is_noop() {
        let mut store = SessionStore::open(Box::new(MemoryBackend::new()));
        let a = session(1);
        store.append(a.clone()).unwrap();
        store.remove("session_42").unwrap();
        assert_eq!(store.sessions(), &[a]);
    }

    #[test]
    fn test_clear_persists_empty_list() {
        let backend = MemoryBackend::new();
        let mut store = SessionStore::open(Box::new(backend.clone()));
        store.append(session(1)).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert_eq!(backend.blob().as_deref(), Some("[]"));
    }

    #[test]
    fn test_corrupt_blob_discarded() {
        let backend = MemoryBackend::with_blob("{not json");
        let store = SessionStore::open(Box::new(backend.clone()));
        assert!(store.is_empty());
        assert_eq!(backend.blob(), None);
    }

    #[test]
    fn test_failed_write_leaves_cache_untouched() {
        let backend = MemoryBackend::new();
        let mut store = SessionStore::open(Box::new(backend.clone()));
        let a = session(1);
        store.append(a.clone()).unwrap();

        backend.set_fail_writes(true);
        assert!(store.append(session(2)).is_err());
        assert!(store.clear().is_err());
        assert_eq!(store.sessions(), &[a]);
    }

    #[test]
    fn test_file_backed_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let s = session(1_700_000_000_000);

        {
            let mut store = SessionStore::open(Box::new(FileBackend::new(&path)));
            store.append(s.clone()).unwrap();
        }

        let store = SessionStore::open(Box::new(FileBackend::new(&path)));
        assert_eq!(store.get(&s.id), Some(&s));
    }

    #[test]
    fn test_corrupt_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "garbage").unwrap();

        let store = SessionStore::open(Box::new(FileBackend::new(&path)));
        assert!(store.is_empty());
        assert!(!path.exists());
    }
}
