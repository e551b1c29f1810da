//! Session storage for Trellis applications.
//!
//! A [`SessionManager`] is started for each request by
//! [`SessionMiddleware`] and attached to the request context, where
//! handlers reach it through [`SessionExt::session`]. Payloads live in a
//! pluggable [`SessionStore`]:
//!
//! - [`FileSessionStore`] - one JSON file per session (default)
//! - [`CookieSessionStore`] - HMAC-signed payload carried in the cookie
//! - [`ArraySessionStore`] - process memory, for tests
//!
//! # Flash data
//!
//! [`SessionManager::flash`] stores a value for the next request only;
//! [`SessionManager::now`] for the current one. Flash bookkeeping is aged
//! as soon as the session starts, so an expired flash value is never
//! observable.
//!
//! ```
//! use std::sync::Arc;
//! use trellis_session::*;
//!
//! # tokio_test::block_on(async {
//! let store: Arc<dyn SessionStore> = Arc::new(ArraySessionStore::new());
//!
//! let session = SessionManager::new(store.clone(), "abc", 3600);
//! session.start().await?;
//! session.flash("status", "Profile updated");
//! session.save().await?;
//!
//! let next = SessionManager::new(store, "abc", 3600);
//! next.start().await?;
//! assert_eq!(next.get_as::<String>("status").as_deref(), Some("Profile updated"));
//! # Ok::<(), SessionError>(())
//! # }).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod manager;
pub mod middleware;
pub mod resolver;
pub mod store;
pub mod stores;

pub use config::{DEFAULT_COOKIE_NAME, DEFAULT_LIFETIME, SESSION_ID_LENGTH, SessionConfig, SessionDriver};
pub use error::{SessionError, SessionResult};
pub use manager::SessionManager;
pub use middleware::{SessionExt, SessionMiddleware, create_store};
pub use resolver::SessionIdentityResolver;
pub use store::{SessionData, SessionStore, generate_session_id, is_plain_session_id};
pub use stores::{ArraySessionStore, CookieSessionStore, FileSessionStore};
