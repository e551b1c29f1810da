//! Session-backed identity for the auth middleware.

use crate::middleware::SessionExt;
use async_trait::async_trait;
use serde_json::Value;
use trellis_core::{IdentityResolver, RequestContext, Result};

/// Session key holding the authenticated user's id.
pub const DEFAULT_USER_KEY: &str = "user_id";

/// Resolves the current user id from the session started by
/// [`SessionMiddleware`](crate::SessionMiddleware).
#[derive(Debug, Clone)]
pub struct SessionIdentityResolver {
    key: String,
}

impl SessionIdentityResolver {
    pub fn new() -> Self {
        Self {
            key: DEFAULT_USER_KEY.to_string(),
        }
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl Default for SessionIdentityResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityResolver for SessionIdentityResolver {
    async fn resolve(&self, ctx: &RequestContext) -> Result<Option<String>> {
        let Some(session) = ctx.session() else {
            return Ok(None);
        };
        Ok(match session.get(&self.key) {
            Some(Value::String(id)) if !id.is_empty() => Some(id),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SessionConfig, SessionMiddleware};
    use trellis_core::{HttpRequest, Middleware};

    #[tokio::test]
    async fn test_resolves_numeric_and_string_ids() {
        let mw = SessionMiddleware::new(SessionConfig::array()).unwrap();
        let ctx = RequestContext::new(HttpRequest::new("GET", "/"));
        let resolver = SessionIdentityResolver::new();

        assert_eq!(resolver.resolve(&ctx).await.unwrap(), None);

        mw.before(&ctx).await.unwrap();
        assert_eq!(resolver.resolve(&ctx).await.unwrap(), None);

        ctx.session().unwrap().put("user_id", 12);
        assert_eq!(resolver.resolve(&ctx).await.unwrap().as_deref(), Some("12"));

        ctx.session().unwrap().put("user_id", "abc");
        assert_eq!(resolver.resolve(&ctx).await.unwrap().as_deref(), Some("abc"));
    }
}
