/// Where the signed-in user id is remembered between runs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use super::SessionError;

/// Remembers the signed-in user id
pub trait SessionPersistence: Send + Sync {
    fn load(&self) -> Result<Option<String>, SessionError>;
    fn save(&self, user_id: &str) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    user_id: String,
}

/// Session kept in a small JSON file
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSessionStore { path: path.into() }
    }
}

impl SessionPersistence for FileSessionStore {
    fn load(&self) -> Result<Option<String>, SessionError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::Persistence(e.to_string())),
        };

        match serde_json::from_str::<PersistedSession>(&content) {
            Ok(session) => Ok(Some(session.user_id)),
            Err(e) => {
                // An unreadable session just means signing in again
                tracing::warn!(path = %self.path.display(), error = %e, "Ignoring unreadable session file");
                Ok(None)
            }
        }
    }

    fn save(&self, user_id: &str) -> Result<(), SessionError> {
        let content = serde_json::to_string(&PersistedSession {
            user_id: user_id.to_string(),
        })
        .map_err(|e| SessionError::Persistence(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SessionError::Persistence(e.to_string()))?;
        }
        fs::write(&self.path, content).map_err(|e| SessionError::Persistence(e.to_string()))
    }

    fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Persistence(e.to_string())),
        }
    }
}

/// Session kept in memory only
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    user_id: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `user_id` already remembered
    pub fn with_user(user_id: impl Into<String>) -> Self {
        MemorySessionStore {
            user_id: Mutex::new(Some(user_id.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.user_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionPersistence for MemorySessionStore {
    fn load(&self) -> Result<Option<String>, SessionError> {
        Ok(self.slot().clone())
    }

    fn save(&self, user_id: &str) -> Result<(), SessionError> {
        *self.slot() = Some(user_id.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.slot() = None;
        Ok(())
    }
}
