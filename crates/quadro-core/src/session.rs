use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::datastore::{load_json, remove_file, save_json_atomic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub username: Option<String>,
    pub saved_at: DateTime<Utc>,
}

/// Bearer tokens persisted in `session.json`. The in-memory copy is the
/// source of truth for requests; every change is written through.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    current: Mutex<Option<Session>>,
}

impl SessionStore {
    pub fn open(path: &Path) -> Self {
        let current = match load_json::<Session>(path) {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "ignoring unreadable session");
                None
            }
        };
        Self {
            path: path.to_path_buf(),
            current: Mutex::new(current),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.current.lock().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.current.lock().as_ref().map(|s| s.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.current
            .lock()
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
    }

    pub fn save(&self, session: Session) -> anyhow::Result<()> {
        save_json_atomic(&self.path, &session)?;
        info!(user = ?session.username, "session saved");
        *self.current.lock() = Some(session);
        Ok(())
    }

    /// Replaces the access token after a refresh; a rotated refresh token
    /// replaces the old one too.
    pub fn rotate(&self, access_token: String, refresh_token: Option<String>) -> anyhow::Result<()> {
        let mut current = self.current.lock();
        let Some(session) = current.as_mut() else {
            anyhow::bail!("no session to refresh");
        };
        session.access_token = access_token;
        if refresh_token.is_some() {
            session.refresh_token = refresh_token;
        }
        session.saved_at = Utc::now();
        save_json_atomic(&self.path, &*session)
    }

    pub fn purge(&self) -> anyhow::Result<()> {
        *self.current.lock() = None;
        info!("session purged");
        remove_file(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session {
            access_token: "a1".to_string(),
            refresh_token: Some("r1".to_string()),
            user_id: Some(7),
            username: Some("ana".to_string()),
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn tokens_persist_rotate_and_purge() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");

        let store = SessionStore::open(&path);
        assert_eq!(store.access_token(), None);
        assert!(store.rotate("x".to_string(), None).is_err());

        store.save(session()).expect("save");
        store.rotate("a2".to_string(), None).expect("rotate");

        let reopened = SessionStore::open(&path);
        assert_eq!(reopened.access_token(), Some("a2".to_string()));
        assert_eq!(reopened.refresh_token(), Some("r1".to_string()));

        reopened.purge().expect("purge");
        assert!(reopened.current().is_none());
        assert!(SessionStore::open(&path).current().is_none());
    }
}
