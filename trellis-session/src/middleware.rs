//! Session middleware: starts the session before the handler and saves it
//! afterwards.

use crate::config::{SESSION_ID_LENGTH, SessionConfig, SessionDriver};
use crate::error::SessionResult;
use crate::manager::SessionManager;
use crate::store::{SessionStore, generate_session_id};
use crate::stores::{ArraySessionStore, CookieSessionStore, FileSessionStore};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, warn};
use trellis_core::{Cookie, Middleware, Reply, RequestContext, Result};

/// Access to the request's session.
pub trait SessionExt {
    /// The session started by [`SessionMiddleware`], if any.
    fn session(&self) -> Option<Arc<SessionManager>>;
}

impl SessionExt for RequestContext {
    fn session(&self) -> Option<Arc<SessionManager>> {
        self.extension::<SessionManager>()
    }
}

/// Starts a [`SessionManager`] for every request and persists it on the way
/// out, setting the session cookie.
pub struct SessionMiddleware {
    config: SessionConfig,
    store: Arc<dyn SessionStore>,
}

impl SessionMiddleware {
    /// Build the middleware with the store selected by `config.driver`.
    pub fn new(config: SessionConfig) -> SessionResult<Self> {
        let store = create_store(&config)?;
        Ok(Self { config, store })
    }

    /// Use an explicit store.
    pub fn with_store(config: SessionConfig, store: Arc<dyn SessionStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    fn session_cookie(&self, value: String) -> Cookie {
        let mut cookie = Cookie::new(&self.config.cookie_name, value)
            .path(&self.config.cookie_path)
            .secure(self.config.cookie_secure)
            .http_only(self.config.cookie_http_only)
            .same_site(self.config.cookie_same_site)
            .max_age(self.config.lifetime as i64);
        if let Some(domain) = &self.config.cookie_domain {
            cookie = cookie.domain(domain);
        }
        cookie
    }

    fn maybe_run_gc(&self) {
        let (chances, out_of) = self.config.lottery;
        if rand::thread_rng().gen_range(1..=out_of.max(1)) > chances {
            return;
        }

        let store = Arc::clone(&self.store);
        let lifetime = self.config.lifetime;
        tokio::spawn(async move {
            match store.gc(lifetime).await {
                Ok(deleted) => debug!(driver = store.driver(), deleted, "Session GC finished"),
                Err(e) => warn!(driver = store.driver(), error = %e, "Session GC failed"),
            }
        });
    }
}

/// Instantiate the store for a driver.
pub fn create_store(config: &SessionConfig) -> SessionResult<Arc<dyn SessionStore>> {
    Ok(match config.driver {
        SessionDriver::File => Arc::new(FileSessionStore::new(&config.path, config.lifetime)?),
        SessionDriver::Cookie => {
            let secret = config.secret.as_deref().ok_or_else(|| {
                crate::error::SessionError::Config("cookie driver requires a secret".to_string())
            })?;
            Arc::new(CookieSessionStore::new(secret))
        }
        SessionDriver::Array => Arc::new(ArraySessionStore::new()),
    })
}

#[async_trait]
impl Middleware for SessionMiddleware {
    async fn before(&self, ctx: &RequestContext) -> Result<Option<Reply>> {
        let session_id = match ctx.request().cookie(&self.config.cookie_name) {
            Some(id) if self.store.is_valid_id(&id) => id,
            Some(id) if !id.is_empty() => {
                debug!(driver = self.store.driver(), "Malformed session cookie replaced");
                generate_session_id(SESSION_ID_LENGTH)
            }
            _ => generate_session_id(SESSION_ID_LENGTH),
        };

        let session = SessionManager::new(Arc::clone(&self.store), session_id, self.config.lifetime);
        session.start().await?;
        ctx.insert_extension(session);
        Ok(None)
    }

    async fn after(&self, ctx: &RequestContext, reply: Reply) -> Result<Reply> {
        let Some(session) = ctx.session() else {
            return Ok(reply);
        };

        session.save().await?;
        ctx.queue_cookie(self.session_cookie(session.cookie_value()?));
        self.maybe_run_gc();
        Ok(reply)
    }
}
