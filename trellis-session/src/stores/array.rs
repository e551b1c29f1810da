use crate::error::SessionResult;
use crate::store::{SessionData, SessionStore};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory session storage. Sessions are lost on restart.
#[derive(Debug, Default)]
pub struct ArraySessionStore {
    sessions: RwLock<HashMap<String, SessionData>>,
}

impl ArraySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every stored session.
    pub fn clear_all(&self) {
        self.sessions.write().clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl SessionStore for ArraySessionStore {
    async fn read(&self, session_id: &str) -> SessionResult<SessionData> {
        Ok(self
            .sessions
            .read()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn write(&self, session_id: &str, data: &SessionData) -> SessionResult<()> {
        self.sessions
            .write()
            .insert(session_id.to_string(), data.clone());
        Ok(())
    }

    async fn destroy(&self, session_id: &str) -> SessionResult<()> {
        self.sessions.write().remove(session_id);
        Ok(())
    }

    async fn gc(&self, _max_lifetime: u64) -> SessionResult<usize> {
        Ok(0)
    }

    async fn exists(&self, session_id: &str) -> SessionResult<bool> {
        Ok(self.sessions.read().contains_key(session_id))
    }

    fn driver(&self) -> &'static str {
        "array"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_write_destroy() {
        let store = ArraySessionStore::new();
        assert!(store.read("abc").await.unwrap().is_empty());

        let mut data = SessionData::new();
        data.insert("user_id".into(), json!(7));
        store.write("abc", &data).await.unwrap();

        assert!(store.exists("abc").await.unwrap());
        assert_eq!(store.read("abc").await.unwrap()["user_id"], 7);

        store.destroy("abc").await.unwrap();
        assert!(!store.exists("abc").await.unwrap());
    }
}
