//! Session context and its on-disk store.
//!
//! The backend identifies an uploaded document by a session identifier.
//! It is passed explicitly to every request as a [`SessionContext`]; the
//! [`SessionStore`] only remembers it between invocations.

use crate::error::TransportError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Identifier of a backend session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
}

impl SessionContext {
    /// Build a context; blank identifiers are rejected.
    pub fn new(session_id: impl Into<String>) -> Option<Self> {
        let session_id = session_id.into().trim().to_string();
        if session_id.is_empty() {
            None
        } else {
            Some(Self { session_id })
        }
    }
}

impl fmt::Display for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.session_id)
    }
}

/// Persists the current session identifier in a single key file.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored session, if any.
    pub fn load(&self) -> io::Result<Option<SessionContext>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => Ok(SessionContext::new(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Load the stored session or fail with [`TransportError::NoSession`].
    pub fn require(&self) -> Result<SessionContext, TransportError> {
        match self.load() {
            Ok(Some(session)) => Ok(session),
            Ok(None) => Err(TransportError::NoSession),
            Err(e) => {
                debug!("Cannot read session store {}: {}", self.path.display(), e);
                Err(TransportError::NoSession)
            }
        }
    }

    /// Replace the stored session.
    pub fn save(&self, session: &SessionContext) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, &session.session_id)?;
        debug!("Stored session {} in {}", session, self.path.display());
        Ok(())
    }

    /// Forget the stored session. Clearing an empty store is not an error.
    pub fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_context_rejects_blank() {
        assert!(SessionContext::new("  ").is_none());
        assert_eq!(
            SessionContext::new(" 1718200000\n").unwrap().session_id,
            "1718200000"
        );
    }

    #[test]
    fn test_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join(".rfpaudit").join("session_id"));

        assert_eq!(store.load().unwrap(), None);
        assert!(matches!(store.require(), Err(TransportError::NoSession)));

        let session = SessionContext::new("1718200000").unwrap();
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session.clone()));
        assert_eq!(store.require().unwrap(), session);

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.clear().unwrap();
    }

    #[test]
    fn test_save_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("session_id"));

        store.save(&SessionContext::new("first").unwrap()).unwrap();
        store.save(&SessionContext::new("second").unwrap()).unwrap();
        assert_eq!(store.load().unwrap().unwrap().session_id, "second");
    }
}
