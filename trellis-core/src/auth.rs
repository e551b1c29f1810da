//! Authentication: resolving the current user and the `auth`/`guest`
//! middleware.
//!
//! Resolution is split in two. An [`IdentityResolver`] reads a user id off
//! the request (a session entry, a token), and a [`UserProvider`] loads the
//! user record for that id. [`AuthService`] puts a TTL cache in between.

use crate::context::RequestContext;
use crate::middleware::Middleware;
use crate::response::Reply;
use crate::response_helper::ResponseHelper;
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::logging::{debug, warn};

/// Default lifetime of a cached user record.
pub const DEFAULT_USER_CACHE_TTL: Duration = Duration::from_secs(300);

/// Loads user records. Records are serialized without hidden fields.
#[async_trait]
pub trait UserProvider: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<Value>>;

    async fn find_by_email(&self, _email: &str) -> Result<Option<Value>> {
        Ok(None)
    }
}

/// Extracts the authenticated user id from a request.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, ctx: &RequestContext) -> Result<Option<String>>;
}

/// User records held in memory, keyed by id.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserProvider {
    users: HashMap<String, Value>,
    hidden: Vec<String>,
}

impl InMemoryUserProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields stripped from every returned record.
    pub fn hidden<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_user(mut self, id: impl Into<String>, user: Value) -> Self {
        self.users.insert(id.into(), user);
        self
    }

    fn visible(&self, user: &Value) -> Value {
        let mut user = user.clone();
        if let Some(obj) = user.as_object_mut() {
            for field in &self.hidden {
                obj.remove(field);
            }
        }
        user
    }
}

#[async_trait]
impl UserProvider for InMemoryUserProvider {
    async fn find_by_id(&self, id: &str) -> Result<Option<Value>> {
        Ok(self.users.get(id).map(|u| self.visible(u)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Value>> {
        Ok(self
            .users
            .values()
            .find(|u| u.get("email").and_then(Value::as_str) == Some(email))
            .map(|u| self.visible(u)))
    }
}

/// Resolves the current user with a per-id TTL cache.
///
/// The cache is shared by all requests and guarded by a mutex that is never
/// held across an await.
pub struct AuthService {
    provider: Arc<dyn UserProvider>,
    resolver: Arc<dyn IdentityResolver>,
    cache: Mutex<HashMap<String, (Value, Instant)>>,
    ttl: Duration,
}

impl AuthService {
    pub fn new(provider: Arc<dyn UserProvider>, resolver: Arc<dyn IdentityResolver>) -> Self {
        Self {
            provider,
            resolver,
            cache: Mutex::new(HashMap::new()),
            ttl: DEFAULT_USER_CACHE_TTL,
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn provider(&self) -> &Arc<dyn UserProvider> {
        &self.provider
    }

    /// The user for this request, from cache or the provider.
    pub async fn user_from_request(&self, ctx: &RequestContext) -> Result<Option<Value>> {
        let Some(id) = self.resolver.resolve(ctx).await? else {
            return Ok(None);
        };

        {
            let mut cache = self.cache.lock();
            match cache.get(&id) {
                Some((user, expires)) if Instant::now() < *expires => {
                    return Ok(Some(user.clone()));
                }
                Some(_) => {
                    cache.remove(&id);
                }
                None => {}
            }
        }

        let user = self.provider.find_by_id(&id).await?;
        if let Some(user) = &user {
            self.cache
                .lock()
                .insert(id, (user.clone(), Instant::now() + self.ttl));
        }
        Ok(user)
    }

    pub fn invalidate_user_cache(&self, id: &str) {
        self.cache.lock().remove(id);
    }

    pub fn clear_user_cache(&self) {
        self.cache.lock().clear();
    }

    pub fn cached_users(&self) -> usize {
        self.cache.lock().len()
    }

    /// `{isAuthenticated, user}` for embedding in pages.
    pub fn user_as_json(ctx: &RequestContext) -> Value {
        match ctx.user() {
            Some(user) => json!({"isAuthenticated": true, "user": user}),
            None => json!({"isAuthenticated": false, "user": null}),
        }
    }
}

/// Requires an authenticated user.
///
/// JSON clients and `api` routes get a 401 envelope; browsers are
/// redirected to the login page. Resolution failures count as
/// unauthenticated.
pub struct AuthMiddleware {
    auth: Arc<AuthService>,
    redirect_to: String,
}

impl AuthMiddleware {
    pub fn new(auth: Arc<AuthService>, redirect_to: impl Into<String>) -> Self {
        Self {
            auth,
            redirect_to: redirect_to.into(),
        }
    }

    fn unauthenticated(&self, ctx: &RequestContext) -> Reply {
        if ctx.wants_json() || ctx.blueprint().as_deref() == Some("api") {
            ResponseHelper::unauthorized("Authentication required").into()
        } else {
            ResponseHelper::redirect(&self.redirect_to, 302).into()
        }
    }
}

#[async_trait]
impl Middleware for AuthMiddleware {
    async fn before(&self, ctx: &RequestContext) -> Result<Option<Reply>> {
        match self.auth.user_from_request(ctx).await {
            Ok(Some(user)) => {
                ctx.set_user(Some(user));
                Ok(None)
            }
            Ok(None) => {
                debug!(path = %ctx.path(), "Unauthenticated request");
                Ok(Some(self.unauthenticated(ctx)))
            }
            Err(e) => {
                warn!(error = %e, "Auth resolution failed");
                Ok(Some(self.unauthenticated(ctx)))
            }
        }
    }
}

/// Only lets guests through; authenticated users are sent home.
pub struct GuestMiddleware {
    auth: Arc<AuthService>,
    redirect_to: String,
}

impl GuestMiddleware {
    pub fn new(auth: Arc<AuthService>, redirect_to: impl Into<String>) -> Self {
        Self {
            auth,
            redirect_to: redirect_to.into(),
        }
    }
}

#[async_trait]
impl Middleware for GuestMiddleware {
    async fn before(&self, ctx: &RequestContext) -> Result<Option<Reply>> {
        match self.auth.user_from_request(ctx).await {
            Ok(Some(_)) if ctx.wants_json() => {
                Ok(Some(ResponseHelper::forbidden("Already authenticated").into()))
            }
            Ok(Some(_)) => Ok(Some(ResponseHelper::redirect(&self.redirect_to, 302).into())),
            Ok(None) => Ok(None),
            Err(e) => {
                warn!(error = %e, "Auth resolution failed, treating request as guest");
                Ok(None)
            }
        }
    }
}
