//! Persistent login session: the current user and their bearer token.
//!
//! The session lives in a single JSON file. Writes go to a sibling temp file
//! that is renamed into place, so a reader never sees a half-written session.

use crate::model::User;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

pub struct SessionStore {
    path: PathBuf,
    current: Option<Session>,
}

impl SessionStore {
    /// Open the store at `path`, loading any saved session.
    /// A missing file means no session. A corrupt file is removed.
    pub fn open(path: &Path) -> Result<Self> {
        let current = match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<Session>(&content) {
                Ok(session) => {
                    debug!(path = %path.display(), user = %session.user.username, "session loaded");
                    Some(session)
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "discarding unreadable session");
                    remove_if_exists(path)?;
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(e).with_context(|| format!("reading session {}", path.display()))
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            current,
        })
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.current.as_ref().map(|s| &s.user)
    }

    pub fn token(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.token.as_str())
    }

    /// Replace the session wholesale (login, registration) and persist it
    pub fn replace(&mut self, session: Session) -> Result<()> {
        self.write(&session)?;
        debug!(user = %session.user.username, "session saved");
        self.current = Some(session);
        Ok(())
    }

    /// Forget the session and delete the file
    pub fn clear(&mut self) -> Result<()> {
        remove_if_exists(&self.path)?;
        self.current = None;
        debug!(path = %self.path.display(), "session cleared");
        Ok(())
    }

    /// Swap in updated user details after a profile change.
    /// Ignored (returns false) unless a session exists for the same user id.
    pub fn update_user(&mut self, user: User) -> Result<bool> {
        let Some(current) = &self.current else {
            return Ok(false);
        };
        if current.user.id != user.id {
            return Ok(false);
        }
        let next = Session {
            token: current.token.clone(),
            user,
        };
        self.replace(next)?;
        Ok(true)
    }

    /// Write through a uniquely named temp file in the same directory, then
    /// rename over the target. The temp file is created owner-only (0600).
    fn write(&self, session: &Session) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;

        let mut tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("creating temp file in {}", parent.display()))?;
        serde_json::to_writer_pretty(&mut tmp, session)?;
        tmp.flush()?;
        tmp.persist(&self.path)
            .with_context(|| format!("saving session {}", self.path.display()))?;
        Ok(())
    }
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use tempfile::TempDir;

    fn session(id: i64, role: Role) -> Session {
        Session {
            token: format!("token-{}", id),
            user: User {
                id,
                username: format!("user{}", id),
                email: format!("user{}@example.com", id),
                role,
            },
        }
    }

    #[test]
    fn test_missing_file_means_no_session() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::open(&dir.path().join("session.json")).unwrap();
        assert!(store.current().is_none());
        assert!(store.token().is_none());
        assert!(store.user().is_none());
    }

    #[test]
    fn test_replace_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut store = SessionStore::open(&path).unwrap();
        store.replace(session(3, Role::Author)).unwrap();
        assert_eq!(store.token(), Some("token-3"));

        let reopened = SessionStore::open(&path).unwrap();
        assert_eq!(reopened.current(), Some(&session(3, Role::Author)));
        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("session.json")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let mut store = SessionStore::open(&path).unwrap();
        store.replace(session(2, Role::Author)).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0, "session file mode {:o}", mode & 0o777);

        // Rewrites keep the restricted mode
        let mut updated = session(2, Role::Author).user;
        updated.email = "new@example.com".to_string();
        store.update_user(updated).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o077, 0);
    }

    #[test]
    fn test_corrupt_file_is_cleared() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = SessionStore::open(&path).unwrap();
        assert!(store.current().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_clear_removes_file_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let mut store = SessionStore::open(&path).unwrap();
        store.replace(session(1, Role::Reader)).unwrap();

        store.clear().unwrap();
        assert!(store.current().is_none());
        assert!(!path.exists());
        store.clear().unwrap();
    }

    #[test]
    fn test_update_user_same_id_keeps_token() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.json");
        let mut store = SessionStore::open(&path).unwrap();
        store.replace(session(4, Role::Author)).unwrap();

        let mut updated = session(4, Role::Author).user;
        updated.username = "renamed".to_string();
        assert!(store.update_user(updated).unwrap());
        assert_eq!(store.user().unwrap().username, "renamed");
        assert_eq!(store.token(), Some("token-4"));

        let reopened = SessionStore::open(&path).unwrap();
        assert_eq!(reopened.user().unwrap().username, "renamed");
    }

    #[test]
    fn test_update_user_other_id_ignored() {
        let dir = TempDir::new().unwrap();
        let mut store = SessionStore::open(&dir.path().join("session.json")).unwrap();
        assert!(!store.update_user(session(1, Role::Admin).user).unwrap());

        store.replace(session(4, Role::Author)).unwrap();
        assert!(!store.update_user(session(5, Role::Admin).user).unwrap());
        assert_eq!(store.user().unwrap().id, 4);
        assert_eq!(store.user().unwrap().role, Role::Author);
    }
}
