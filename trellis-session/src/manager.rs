//! Per-request session handle with flash data.

use crate::config::SESSION_ID_LENGTH;
use crate::error::SessionResult;
use crate::store::{EXPIRE_AT_KEY, SessionData, SessionStore, generate_session_id, now_secs};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const FLASH_OLD: &str = "_flash.old";
const FLASH_NEW: &str = "_flash.new";
const DESTROY_OLD: &str = "_destroy_old_id";

#[derive(Debug, Default)]
struct State {
    id: String,
    data: SessionData,
    loaded: bool,
    dirty: bool,
}

/// Session bound to one request.
///
/// Reads and writes go through an internal lock, so the handle can be
/// shared through the request context as an `Arc` and used from handlers
/// and middleware alike. The lock is never held across an await.
///
/// ```
/// use std::sync::Arc;
/// use trellis_session::{ArraySessionStore, SessionManager};
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(ArraySessionStore::new());
/// let session = SessionManager::new(store, "abc", 3600);
/// session.start().await.unwrap();
/// session.put("user_id", 42);
/// assert_eq!(session.get_as::<i64>("user_id"), Some(42));
/// # });
/// ```
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    lifetime: u64,
    state: Mutex<State>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, session_id: impl Into<String>, lifetime: u64) -> Self {
        Self {
            store,
            lifetime,
            state: Mutex::new(State {
                id: session_id.into(),
                ..Default::default()
            }),
        }
    }

    /// Load the session from the store and age flash data.
    ///
    /// Keys flashed on the previous request become readable now; keys that
    /// were readable on the previous request and not kept are dropped.
    pub async fn start(&self) -> SessionResult<()> {
        let id = {
            let state = self.state.lock();
            if state.loaded {
                return Ok(());
            }
            state.id.clone()
        };

        let data = self.store.read(&id).await?;

        let mut state = self.state.lock();
        state.data = data;
        state.loaded = true;
        if reconcile_flash(&mut state.data) {
            // Aged bookkeeping must reach the store even on read-only requests.
            state.dirty = true;
        }
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.state.lock().loaded
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    pub fn id(&self) -> String {
        self.state.lock().id.clone()
    }

    pub fn set_id(&self, session_id: impl Into<String>) {
        self.state.lock().id = session_id.into();
    }

    pub fn lifetime(&self) -> u64 {
        self.lifetime
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    // ===== Retrieval =====

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.lock().data.get(key).cloned()
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| serde_json::from_value(v).ok())
    }

    /// All user data, without internal `_`-prefixed keys.
    pub fn all(&self) -> SessionData {
        self.state
            .lock()
            .data
            .iter()
            .filter(|(k, _)| !k.starts_with('_'))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn has(&self, key: &str) -> bool {
        self.state.lock().data.contains_key(key)
    }

    pub fn missing(&self, key: &str) -> bool {
        !self.has(key)
    }

    // ===== Storage =====

    pub fn put(&self, key: impl Into<String>, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        let mut state = self.state.lock();
        state.data.insert(key.into(), value);
        state.dirty = true;
    }

    /// Append to an array value, wrapping a scalar into an array first.
    pub fn push(&self, key: &str, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        let mut state = self.state.lock();
        let entry = state.data.entry(key.to_string()).or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => items.push(value),
            other => *other = Value::Array(vec![other.take(), value]),
        }
        state.dirty = true;
    }

    pub fn increment(&self, key: &str, amount: i64) -> i64 {
        let mut state = self.state.lock();
        let current = state.data.get(key).and_then(as_i64).unwrap_or(0);
        let next = current + amount;
        state.data.insert(key.to_string(), Value::from(next));
        state.dirty = true;
        next
    }

    pub fn decrement(&self, key: &str, amount: i64) -> i64 {
        self.increment(key, -amount)
    }

    // ===== Removal =====

    pub fn forget<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock();
        for key in keys {
            state.data.remove(key.as_ref());
        }
        state.dirty = true;
    }

    /// Read and remove a value.
    pub fn pull(&self, key: &str) -> Option<Value> {
        let mut state = self.state.lock();
        state.dirty = true;
        state.data.remove(key)
    }

    pub fn flush(&self) {
        let mut state = self.state.lock();
        state.data.clear();
        state.dirty = true;
    }

    // ===== Flash data =====

    /// Store a value readable on the next request only.
    pub fn flash(&self, key: &str, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        let mut state = self.state.lock();
        state.data.insert(key.to_string(), value);
        add_flash_key(&mut state.data, FLASH_NEW, key);
        state.dirty = true;
    }

    /// Store a value readable on this request only.
    pub fn now(&self, key: &str, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        let mut state = self.state.lock();
        state.data.insert(key.to_string(), value);
        add_flash_key(&mut state.data, FLASH_OLD, key);
        state.dirty = true;
    }

    /// Keep every current flash value for one more request.
    pub fn reflash(&self) {
        let mut state = self.state.lock();
        let old = flash_keys(&state.data, FLASH_OLD);
        for key in old {
            add_flash_key(&mut state.data, FLASH_NEW, &key);
        }
        state.dirty = true;
    }

    /// Keep the given flash values for one more request; `None` keeps all.
    pub fn keep(&self, keys: Option<&[&str]>) {
        let Some(keys) = keys else {
            self.reflash();
            return;
        };

        let mut state = self.state.lock();
        let old = flash_keys(&state.data, FLASH_OLD);
        for key in keys.iter().filter(|k| old.iter().any(|o| o == *k)) {
            add_flash_key(&mut state.data, FLASH_NEW, key);
        }
        state.dirty = true;
    }

    // ===== Lifecycle =====

    /// Switch to a fresh id. With `destroy_old` the previous session is
    /// removed from the store on the next save.
    pub fn regenerate(&self, destroy_old: bool) -> String {
        let new_id = generate_session_id(SESSION_ID_LENGTH);
        let mut state = self.state.lock();
        let old_id = std::mem::replace(&mut state.id, new_id.clone());
        if destroy_old {
            state.data.insert(DESTROY_OLD.to_string(), Value::String(old_id));
        }
        state.dirty = true;
        new_id
    }

    /// Flush all data and regenerate the id, destroying the old session.
    pub fn invalidate(&self) -> String {
        self.flush();
        self.regenerate(true)
    }

    /// Write the session back if anything changed.
    pub async fn save(&self) -> SessionResult<()> {
        let (id, data, destroy) = {
            let mut state = self.state.lock();
            if !state.dirty {
                return Ok(());
            }
            let destroy = state
                .data
                .remove(DESTROY_OLD)
                .and_then(|v| v.as_str().map(str::to_string));
            let expire_at = now_secs() + self.lifetime as f64;
            state.data.insert(EXPIRE_AT_KEY.to_string(), Value::from(expire_at));
            state.dirty = false;
            (state.id.clone(), state.data.clone(), destroy)
        };

        self.store.write(&id, &data).await?;
        if let Some(old_id) = destroy {
            debug!(driver = self.store.driver(), "Destroying regenerated session");
            self.store.destroy(&old_id).await?;
        }
        Ok(())
    }

    /// Value for the session cookie: the id, or the signed payload for the
    /// cookie store.
    pub fn cookie_value(&self) -> SessionResult<String> {
        let (id, data) = {
            let state = self.state.lock();
            (state.id.clone(), state.data.clone())
        };
        self.store.cookie_value(&id, &data)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        let prefix: String = state.id.chars().take(8).collect();
        f.debug_struct("SessionManager")
            .field("id", &format!("{}...", prefix))
            .field("keys", &state.data.len())
            .field("dirty", &state.dirty)
            .finish()
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn flash_keys(data: &SessionData, list: &str) -> Vec<String> {
    data.get(list)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn add_flash_key(data: &mut SessionData, list: &str, key: &str) {
    let mut keys = flash_keys(data, list);
    if !keys.iter().any(|k| k == key) {
        keys.push(key.to_string());
    }
    data.insert(list.to_string(), Value::from(keys));
}

/// Age flash bookkeeping after a read. Returns whether anything changed.
fn reconcile_flash(data: &mut SessionData) -> bool {
    let old = flash_keys(data, FLASH_OLD);
    let new = flash_keys(data, FLASH_NEW);

    for key in old.iter().filter(|k| !new.contains(k)) {
        data.remove(key);
    }

    let changed = !old.is_empty() || !new.is_empty();
    data.insert(FLASH_OLD.to_string(), Value::from(new));
    data.insert(FLASH_NEW.to_string(), Value::Array(Vec::new()));
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::ArraySessionStore;
    use serde_json::json;

    fn store() -> Arc<dyn SessionStore> {
        Arc::new(ArraySessionStore::new())
    }

    async fn started(store: &Arc<dyn SessionStore>, id: &str) -> SessionManager {
        let session = SessionManager::new(Arc::clone(store), id, 3600);
        session.start().await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_put_get_forget_pull() {
        let store = store();
        let session = started(&store, "s1").await;

        session.put("name", "ada");
        session.put("count", 1);
        assert_eq!(session.get("name"), Some(json!("ada")));
        assert!(session.has("count"));

        session.forget(["count"]);
        assert!(session.missing("count"));

        assert_eq!(session.pull("name"), Some(json!("ada")));
        assert!(session.get("name").is_none());
    }

    #[tokio::test]
    async fn test_flash_visible_on_next_request_only() {
        let store = store();

        let first = started(&store, "s1").await;
        first.flash("msg", "hi");
        first.save().await.unwrap();

        let second = started(&store, "s1").await;
        assert_eq!(second.get("msg"), Some(json!("hi")));
        second.save().await.unwrap();

        let third = started(&store, "s1").await;
        assert!(third.get("msg").is_none());
    }

    #[tokio::test]
    async fn test_now_visible_this_request_only() {
        let store = store();

        let first = started(&store, "s1").await;
        first.now("notice", "saved");
        assert_eq!(first.get("notice"), Some(json!("saved")));
        first.save().await.unwrap();

        let second = started(&store, "s1").await;
        assert!(second.get("notice").is_none());
    }

    #[tokio::test]
    async fn test_keep_extends_flash() {
        let store = store();

        let first = started(&store, "s1").await;
        first.flash("a", 1);
        first.flash("b", 2);
        first.save().await.unwrap();

        let second = started(&store, "s1").await;
        second.keep(Some(&["a"]));
        second.save().await.unwrap();

        let third = started(&store, "s1").await;
        assert_eq!(third.get("a"), Some(json!(1)));
        assert!(third.get("b").is_none());
    }

    #[tokio::test]
    async fn test_save_is_noop_when_clean() {
        let store = store();
        let session = started(&store, "s1").await;
        assert!(!session.is_dirty());
        session.save().await.unwrap();
        assert!(!store.exists("s1").await.unwrap());
    }

    #[tokio::test]
    async fn test_regenerate_destroys_old() {
        let store = store();
        let session = started(&store, "s1").await;
        session.put("k", "v");
        session.save().await.unwrap();

        let new_id = session.regenerate(true);
        assert_eq!(new_id.len(), SESSION_ID_LENGTH);
        session.save().await.unwrap();

        assert!(!store.exists("s1").await.unwrap());
        let moved = started(&store, &new_id).await;
        assert_eq!(moved.get("k"), Some(json!("v")));
        assert!(!moved.has(DESTROY_OLD));
    }

    #[tokio::test]
    async fn test_all_hides_internal_keys() {
        let store = store();
        let session = started(&store, "s1").await;
        session.flash("f", true);
        session.put("visible", 1);

        let all = session.all();
        assert!(all.contains_key("visible"));
        assert!(all.keys().all(|k| !k.starts_with('_')));
    }

    #[tokio::test]
    async fn test_increment_and_push() {
        let store = store();
        let session = started(&store, "s1").await;

        assert_eq!(session.increment("visits", 1), 1);
        assert_eq!(session.increment("visits", 2), 3);
        assert_eq!(session.decrement("visits", 1), 2);

        session.put("tags", "a");
        session.push("tags", "b");
        assert_eq!(session.get("tags"), Some(json!(["a", "b"])));
    }
}
