//! Session accessor: the stored identity (user, token, active group).
//!
//! Components receive an `Arc<dyn SessionAccessor>` and never read storage
//! directly. Expired sessions read as absent.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use shared::models::{GroupId, Timestamp};
use tracing::{debug, warn};

use crate::error::{ClientError, ClientResult};

/// Identity persisted between runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSession {
    /// Signed-in user.
    pub username: String,
    /// Bearer token issued at login.
    pub token: String,
    /// Active group, if one was chosen.
    #[serde(default)]
    pub group_id: Option<GroupId>,
    /// Display name of the active group.
    #[serde(default)]
    pub group_name: Option<String>,
    /// After this instant the session reads as absent.
    pub expires_at: Timestamp,
}

impl StoredSession {
    /// Creates a session that expires `ttl` from now.
    #[must_use]
    pub fn new(username: impl Into<String>, token: impl Into<String>, ttl: Duration) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
            group_id: None,
            group_name: None,
            expires_at: Timestamp(Utc::now() + ttl),
        }
    }

    /// Sets the active group.
    #[must_use]
    pub fn with_group(mut self, group_id: GroupId, group_name: Option<String>) -> Self {
        self.group_id = Some(group_id);
        self.group_name = group_name;
        self
    }

    /// Whether the expiry time has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at.0 <= Utc::now()
    }
}

/// Complete identity required to activate the chat view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Signed-in user.
    pub username: String,
    /// Bearer token.
    pub token: String,
    /// Active group.
    pub group_id: GroupId,
    /// Display name of the active group.
    pub group_name: Option<String>,
}

/// Read/write access to the stored identity.
pub trait SessionAccessor: Send + Sync {
    /// The stored session, or `None` when absent or expired.
    fn snapshot(&self) -> Option<StoredSession>;

    /// Replaces the stored session.
    ///
    /// # Errors
    /// Returns an error if the session cannot be persisted.
    fn set_session(&self, session: StoredSession) -> ClientResult<()>;

    /// Removes the stored session.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be cleared.
    fn clear_session(&self) -> ClientResult<()>;

    /// Username of the stored session.
    fn current_user(&self) -> Option<String> {
        self.snapshot()
            .map(|session| session.username)
            .filter(|name| !name.is_empty())
    }

    /// Token of the stored session.
    fn current_token(&self) -> Option<String> {
        self.snapshot()
            .map(|session| session.token)
            .filter(|token| !token.is_empty())
    }

    /// Active group of the stored session.
    fn current_group(&self) -> Option<GroupId> {
        self.snapshot().and_then(|session| session.group_id)
    }

    /// Returns the full identity or names the first missing piece.
    ///
    /// # Errors
    /// Returns [`ClientError::SessionMissing`] when user, token, or group is
    /// absent.
    fn require(&self) -> ClientResult<SessionIdentity> {
        let session = self
            .snapshot()
            .ok_or(ClientError::SessionMissing { field: "session" })?;
        if session.username.is_empty() {
            return Err(ClientError::SessionMissing { field: "user" });
        }
        if session.token.is_empty() {
            return Err(ClientError::SessionMissing { field: "token" });
        }
        let group_id = session
            .group_id
            .ok_or(ClientError::SessionMissing { field: "group" })?;
        Ok(SessionIdentity {
            username: session.username,
            token: session.token,
            group_id,
            group_name: session.group_name,
        })
    }
}

/// Session persisted as JSON on disk.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    /// Store backed by the JSON file at `path`; the file need not exist.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the session file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<StoredSession> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "failed to read session file");
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring malformed session file");
                None
            }
        }
    }
}

impl SessionAccessor for FileSessionStore {
    fn snapshot(&self) -> Option<StoredSession> {
        self.read().filter(|session| {
            let expired = session.is_expired();
            if expired {
                debug!(expires_at = %session.expires_at, "stored session expired");
            }
            !expired
        })
    }

    fn set_session(&self, session: StoredSession) -> ClientResult<()> {
        ensure_parent(&self.path)?;
        let serialized = serde_json::to_vec_pretty(&session)?;
        fs::write(&self.path, serialized)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }
        debug!(path = %self.path.display(), user = %session.username, "session saved");
        Ok(())
    }

    fn clear_session(&self) -> ClientResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "session cleared");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Session held in memory, used when nothing should touch the disk.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<StoredSession>>,
}

impl MemorySessionStore {
    /// Store pre-populated with `session`.
    #[must_use]
    pub fn with_session(session: StoredSession) -> Self {
        Self {
            inner: Mutex::new(Some(session)),
        }
    }
}

impl SessionAccessor for MemorySessionStore {
    fn snapshot(&self) -> Option<StoredSession> {
        self.inner
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
            .filter(|session| !session.is_expired())
    }

    fn set_session(&self, session: StoredSession) -> ClientResult<()> {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = Some(session);
        }
        Ok(())
    }

    fn clear_session(&self) -> ClientResult<()> {
        if let Ok(mut guard) = self.inner.lock() {
            *guard = None;
        }
        Ok(())
    }
}

fn ensure_parent(path: &Path) -> ClientResult<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn alice() -> StoredSession {
        StoredSession::new("alice", "tok-123", Duration::hours(24))
            .with_group(GroupId(3), Some("rustaceans".into()))
    }

    #[test]
    fn file_store_round_trips_and_clears() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("nested").join("session.json"));

        assert!(store.snapshot().is_none());
        store.set_session(alice()).unwrap();

        assert_eq!(store.current_user().as_deref(), Some("alice"));
        assert_eq!(store.current_token().as_deref(), Some("tok-123"));
        assert_eq!(store.current_group(), Some(GroupId(3)));

        store.clear_session().unwrap();
        assert!(store.snapshot().is_none());
        store.clear_session().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn file_store_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("session.json"));
        store.set_session(alice()).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn expired_session_reads_as_absent() {
        let store = MemorySessionStore::with_session(StoredSession::new(
            "alice",
            "tok",
            Duration::seconds(-1),
        ));

        assert!(store.snapshot().is_none());
        assert!(matches!(
            store.require(),
            Err(ClientError::SessionMissing { field: "session" })
        ));
    }

    #[test]
    fn malformed_file_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        assert!(FileSessionStore::new(path).snapshot().is_none());
    }

    #[test]
    fn require_names_missing_group() {
        let store =
            MemorySessionStore::with_session(StoredSession::new("alice", "tok", Duration::hours(1)));

        assert!(matches!(
            store.require(),
            Err(ClientError::SessionMissing { field: "group" })
        ));
    }

    #[test]
    fn require_rejects_blank_token() {
        let store = MemorySessionStore::with_session(
            StoredSession::new("alice", "", Duration::hours(1)).with_group(GroupId(1), None),
        );

        assert!(matches!(
            store.require(),
            Err(ClientError::SessionMissing { field: "token" })
        ));
    }

    #[test]
    fn require_returns_full_identity() {
        let store = MemorySessionStore::with_session(alice());

        let identity = store.require().unwrap();
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.token, "tok-123");
        assert_eq!(identity.group_id, GroupId(3));
        assert_eq!(identity.group_name.as_deref(), Some("rustaceans"));
    }
}
