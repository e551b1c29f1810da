use crate::error::{SessionError, SessionResult};
use crate::store::{EXPIRE_AT_KEY, SessionData, SessionStore, is_expired, is_plain_session_id, now_secs};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// On-disk envelope of a session file.
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    data: SessionData,
    #[serde(rename = "_created_at")]
    created_at: f64,
    #[serde(rename = "_expire_at")]
    expire_at: f64,
}

/// Stores each session as `session_{id}.json` under a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
    default_lifetime: u64,
}

impl FileSessionStore {
    /// Create the store, creating `path` if needed.
    pub fn new(path: impl Into<PathBuf>, default_lifetime: u64) -> SessionResult<Self> {
        let path = path.into();
        std::fs::create_dir_all(&path)?;
        Ok(Self {
            path,
            default_lifetime,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn session_file(&self, session_id: &str) -> Option<PathBuf> {
        // Ids come from a client cookie; only plain tokens map to files.
        if !is_plain_session_id(session_id) {
            return None;
        }
        Some(self.path.join(format!("session_{}.json", session_id)))
    }

    async fn load(path: &Path) -> Option<SessionFile> {
        let raw = fs::read(path).await.ok()?;
        serde_json::from_slice(&raw).ok()
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn read(&self, session_id: &str) -> SessionResult<SessionData> {
        let Some(file) = self.session_file(session_id) else {
            return Ok(SessionData::new());
        };
        let Some(stored) = Self::load(&file).await else {
            return Ok(SessionData::new());
        };

        if stored.expire_at < now_secs() {
            self.destroy(session_id).await?;
            return Ok(SessionData::new());
        }
        Ok(stored.data)
    }

    async fn write(&self, session_id: &str, data: &SessionData) -> SessionResult<()> {
        let Some(file) = self.session_file(session_id) else {
            warn!(session_id = %session_id, "Refusing to write session with malformed id");
            return Err(SessionError::InvalidId);
        };

        let now = now_secs();
        let expire_at = data
            .get(EXPIRE_AT_KEY)
            .and_then(|v| v.as_f64())
            .unwrap_or(now + self.default_lifetime as f64);

        let stored = SessionFile {
            data: data.clone(),
            created_at: now,
            expire_at,
        };
        fs::write(&file, serde_json::to_vec_pretty(&stored)?).await?;
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> SessionResult<()> {
        if let Some(file) = self.session_file(session_id) {
            match fs::remove_file(&file).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn gc(&self, _max_lifetime: u64) -> SessionResult<usize> {
        let mut entries = fs::read_dir(&self.path).await?;
        let mut deleted = 0;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !name.starts_with("session_") || !name.ends_with(".json") {
                continue;
            }

            // Corrupted files are removed along with expired ones.
            let stale = match Self::load(&entry.path()).await {
                Some(stored) => stored.expire_at < now_secs() || is_expired(&stored.data),
                None => true,
            };
            if stale && fs::remove_file(entry.path()).await.is_ok() {
                deleted += 1;
            }
        }

        debug!(deleted, "Session garbage collection finished");
        Ok(deleted)
    }

    async fn exists(&self, session_id: &str) -> SessionResult<bool> {
        match self.session_file(session_id) {
            Some(file) => Ok(fs::try_exists(file).await?),
            None => Ok(false),
        }
    }

    fn driver(&self) -> &'static str {
        "file"
    }
}
