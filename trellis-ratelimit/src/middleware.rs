//! Rate limiting middleware for Trellis
//!
//! Buckets are keyed `"{client_ip}:{route_key}"` where the route key is
//! `auth` for routes under the auth prefix and `api` otherwise. Only routes
//! in the configured blueprints (`api` by default) are limited.

use crate::config::{API_ROUTE_KEY, AUTH_ROUTE_KEY, RateLimitConfig};
use crate::error::{RateLimitHeaders, RateLimitResult};
use crate::sliding_window::{Decision, SlidingWindowLog};
use async_trait::async_trait;
use std::sync::Arc;
use trellis_config::ConfigManager;
use trellis_core::{Middleware, Reply, RequestContext, ResponseHelper, Result};
use tracing::{info, trace};

/// Key under which the allowed decision's headers wait for the after-phase.
const HEADERS_KEY: &str = "_rate_limit_headers";

pub struct RateLimitMiddleware {
    config: RateLimitConfig,
    log: Arc<SlidingWindowLog>,
}

impl RateLimitMiddleware {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            log: Arc::new(SlidingWindowLog::new()),
        }
    }

    pub fn from_config(config: &ConfigManager) -> RateLimitResult<Self> {
        Ok(Self::new(RateLimitConfig::from_config(config)?))
    }

    /// Share a log between middleware instances.
    pub fn with_log(mut self, log: Arc<SlidingWindowLog>) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn log(&self) -> &Arc<SlidingWindowLog> {
        &self.log
    }

    fn should_rate_limit(&self, ctx: &RequestContext) -> bool {
        ctx.blueprint()
            .is_some_and(|bp| self.config.blueprints.iter().any(|b| *b == bp))
    }

    /// `auth` when the route's prefix, minus its blueprint, starts with the
    /// auth segment.
    pub fn route_key(&self, ctx: &RequestContext) -> &'static str {
        let is_auth = ctx
            .route()
            .and_then(|route| route.prefix_without_blueprint())
            .is_some_and(|prefix| prefix.split('/').next() == Some(self.config.auth_prefix.as_str()));
        if is_auth { AUTH_ROUTE_KEY } else { API_ROUTE_KEY }
    }

    /// Check and record one request from `ctx`. `None` when the route is not
    /// limited.
    pub fn check(&self, ctx: &RequestContext) -> Option<Decision> {
        if !self.should_rate_limit(ctx) {
            return None;
        }
        self.log.sweep_idle(self.config.longest_window());
        let route_key = self.route_key(ctx);
        let bucket = format!("{}:{}", ctx.client_ip(), route_key);
        Some(self.log.try_acquire(&bucket, self.config.limit_for(route_key)))
    }
}

#[async_trait]
impl Middleware for RateLimitMiddleware {
    async fn before(&self, ctx: &RequestContext) -> Result<Option<Reply>> {
        let Some(decision) = self.check(ctx) else {
            return Ok(None);
        };
        let limit = self.config.limit_for(self.route_key(ctx));

        if decision.allowed {
            trace!(ip = %ctx.client_ip(), remaining = decision.remaining, "Request allowed");
            if self.config.include_headers {
                ctx.set(HEADERS_KEY, vec![decision.limit, decision.remaining]);
            }
            return Ok(None);
        }

        info!(
            ip = %ctx.client_ip(),
            path = %ctx.path(),
            limit = decision.limit,
            "Rate limit exceeded"
        );
        let mut reply: Reply = ResponseHelper::limit_exceeded(&format!(
            "Too many requests. Limit: {} requests per {} seconds",
            limit.max_requests,
            limit.window.as_secs()
        ))
        .into();
        if self.config.include_headers {
            let retry = decision.retry_after.as_secs().max(1);
            for (name, value) in RateLimitHeaders::denied(decision.limit, retry).to_header_pairs() {
                reply.set_header(name, value);
            }
        }
        Ok(Some(reply))
    }

    async fn after(&self, ctx: &RequestContext, reply: Reply) -> Result<Reply> {
        if let Some([limit, remaining]) = ctx.get_as::<[u64; 2]>(HEADERS_KEY) {
            for (name, value) in RateLimitHeaders::allowed(limit, remaining).to_header_pairs() {
                ctx.queue_header(name, value);
            }
        }
        Ok(reply)
    }
}
