//! Named, route-scoped middleware.

use crate::handler::{BoxFuture, HandlerFn};
use crate::response::Reply;
use crate::middleware::Middleware;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use crate::logging::{debug, warn};

/// Middleware instances addressable by the names routes list in
/// `Route::middleware`.
#[derive(Clone)]
pub struct RouteMiddlewareRegistry {
    middleware: HashMap<String, Arc<dyn Middleware>>,
    strict: bool,
}

impl Default for RouteMiddlewareRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteMiddlewareRegistry {
    pub fn new() -> Self {
        Self {
            middleware: HashMap::new(),
            strict: true,
        }
    }

    /// Skip unknown names with a warning instead of failing.
    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn register(&mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) {
        self.middleware.insert(name.into(), middleware);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Middleware>> {
        self.middleware.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.middleware.contains_key(name)
    }

    pub fn registered(&self) -> Vec<String> {
        let mut names: Vec<_> = self.middleware.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check that every name resolves. Unknown names are an error in strict
    /// mode and a warning otherwise.
    pub fn validate(&self, names: &[String], route: &str) -> Result<()> {
        for name in names {
            if self.has(name) {
                continue;
            }
            if self.strict {
                return Err(Error::MiddlewareNotFound(name.clone()));
            }
            warn!(middleware = %name, route = %route, "Route middleware not found in registry");
        }
        Ok(())
    }

    /// Wrap `handler` with the named middleware; `names[0]` is outermost.
    ///
    /// For `[a, b]` the order is `a.before`, `b.before`, handler, `b.after`,
    /// `a.after`. A before-phase that returns a reply ends the chain: no
    /// inner before-phase, no handler and no after-phase runs. Unknown
    /// names are skipped with a warning.
    pub fn wrap_handler(&self, handler: HandlerFn, names: &[String]) -> HandlerFn {
        let chain: Vec<(String, Arc<dyn Middleware>)> = names
            .iter()
            .filter_map(|name| match self.get(name) {
                Some(middleware) => Some((name.clone(), middleware)),
                None => {
                    warn!(middleware = %name, "Route middleware not found in registry");
                    None
                }
            })
            .collect();

        if chain.is_empty() {
            return handler;
        }

        let chain = Arc::new(chain);
        Arc::new(move |ctx| -> BoxFuture<Result<Reply>> {
            let chain = Arc::clone(&chain);
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                for (name, middleware) in chain.iter() {
                    if let Some(reply) = middleware.before(&ctx).await? {
                        debug!(middleware = %name, "Route middleware short-circuited");
                        return Ok(reply);
                    }
                }

                let mut reply = handler(ctx.clone()).await?;

                for (_, middleware) in chain.iter().rev() {
                    reply = middleware.after(&ctx, reply).await?;
                }
                Ok(reply)
            })
        })
    }
}
