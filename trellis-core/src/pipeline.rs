//! Global middleware pipeline.
//!
//! ## Phases
//!
//! 1. **before**, registration order. Each middleware is first checked
//!    against the current route's blueprint; if it applies it is recorded
//!    as executed on the context and its `before` runs. A reply stops the
//!    phase and the handler is skipped.
//! 2. **after**, reverse order over the executed subset only.
//! 3. **build**, done by the kernel: the reply becomes an `HttpResponse`,
//!    merging the headers and cookies queued during phase 2.
//! 4. **after_build**, reverse order over the same executed subset, on the
//!    serialized response.
//!
//! ## Blueprint gating
//!
//! A named middleware runs for a blueprint only when it is listed in that
//! blueprint's group. Unnamed middleware always runs, as does every
//! middleware for requests without a matched route.

use crate::context::RequestContext;
use crate::middleware::Middleware;
use crate::response::Reply;
use crate::{HttpResponse, Result};
use std::collections::HashMap;
use std::sync::Arc;
use crate::logging::{debug, trace, warn};

struct PipelineEntry {
    name: Option<String>,
    middleware: Arc<dyn Middleware>,
}

#[derive(Default)]
pub struct MiddlewarePipeline {
    entries: Vec<PipelineEntry>,
    groups: HashMap<String, Vec<String>>,
}

impl MiddlewarePipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named middleware, subject to blueprint gating.
    pub fn add(&mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.entries.push(PipelineEntry {
            name: Some(name.into()),
            middleware,
        });
        self
    }

    /// Append a middleware that runs for every blueprint.
    pub fn add_unnamed(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.entries.push(PipelineEntry {
            name: None,
            middleware,
        });
        self
    }

    /// Declare which named middleware run for `blueprint`.
    pub fn group<I, S>(&mut self, blueprint: impl Into<String>, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups
            .insert(blueprint.into(), names.into_iter().map(Into::into).collect());
        self
    }

    pub fn set_groups(&mut self, groups: HashMap<String, Vec<String>>) {
        self.groups = groups;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names in registration order; unnamed entries are omitted.
    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|e| e.name.as_deref())
            .collect()
    }

    /// Whether the middleware named `name` is skipped for `blueprint`.
    pub fn should_skip(&self, name: Option<&str>, blueprint: Option<&str>) -> bool {
        let (Some(name), Some(blueprint)) = (name, blueprint) else {
            return false;
        };
        !self
            .groups
            .get(blueprint)
            .is_some_and(|names| names.iter().any(|n| n == name))
    }

    /// Run the before-phase. Returns the short-circuit reply, if any.
    pub async fn before(&self, ctx: &RequestContext) -> Result<Option<Reply>> {
        let blueprint = ctx.blueprint();

        for (index, entry) in self.entries.iter().enumerate() {
            if self.should_skip(entry.name.as_deref(), blueprint.as_deref()) {
                trace!(middleware = ?entry.name, blueprint = ?blueprint, "Middleware skipped for blueprint");
                continue;
            }

            ctx.mark_executed(index);

            if let Some(reply) = entry.middleware.before(ctx).await? {
                debug!(middleware = ?entry.name, status = reply.status(), "Pipeline short-circuited");
                return Ok(Some(reply));
            }
        }

        Ok(None)
    }

    /// Run the after-phase over the executed middleware, last first.
    pub async fn after(&self, ctx: &RequestContext, mut reply: Reply) -> Result<Reply> {
        for index in ctx.executed_middleware().into_iter().rev() {
            if let Some(entry) = self.entries.get(index) {
                reply = entry.middleware.after(ctx, reply).await?;
            }
        }
        Ok(reply)
    }

    /// Run the after-build phase over the executed middleware, last first.
    ///
    /// A failing hook is logged and the response continues as it is.
    pub async fn after_build(&self, ctx: &RequestContext, response: &mut HttpResponse) {
        for index in ctx.executed_middleware().into_iter().rev() {
            let Some(entry) = self.entries.get(index) else {
                continue;
            };
            if let Err(e) = entry.middleware.after_build(ctx, response).await {
                warn!(middleware = ?entry.name, error = %e, "After-build hook failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpRequest, Route, handler};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        stop: bool,
    }

    #[async_trait]
    impl Middleware for Recorder {
        async fn before(&self, _ctx: &RequestContext) -> Result<Option<Reply>> {
            self.log.lock().push(format!("{}.before", self.name));
            Ok(self.stop.then(|| HttpResponse::new(403).into()))
        }

        async fn after(&self, _ctx: &RequestContext, reply: Reply) -> Result<Reply> {
            self.log.lock().push(format!("{}.after", self.name));
            Ok(reply)
        }

        async fn after_build(&self, _ctx: &RequestContext, response: &mut HttpResponse) -> Result<()> {
            self.log.lock().push(format!("{}.after_build", self.name));
            response.set_header(format!("X-{}", self.name), "1");
            Ok(())
        }
    }

    fn pipeline(stop: Option<&str>) -> (MiddlewarePipeline, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut pipeline = MiddlewarePipeline::new();
        for name in ["m1", "m2", "m3"] {
            pipeline.add(
                name,
                Arc::new(Recorder { name, log: log.clone(), stop: stop == Some(name) }),
            );
        }
        (pipeline, log)
    }

    fn ctx_with_blueprint(blueprint: &str) -> RequestContext {
        let ctx = RequestContext::new(HttpRequest::new("GET", "/"));
        let mut route = Route::new(["GET"], "/", handler(|_| async { Ok(HttpResponse::ok()) }));
        route.blueprint(blueprint);
        ctx.set_route(Some(Arc::new(route)));
        ctx
    }

    #[tokio::test]
    async fn test_phase_order() {
        let (pipeline, log) = pipeline(None);
        let ctx = RequestContext::new(HttpRequest::new("GET", "/"));

        assert!(pipeline.before(&ctx).await.unwrap().is_none());
        let reply = pipeline.after(&ctx, HttpResponse::ok().into()).await.unwrap();
        let mut response = reply.build(&ctx);
        pipeline.after_build(&ctx, &mut response).await;

        assert_eq!(
            *log.lock(),
            [
                "m1.before", "m2.before", "m3.before",
                "m3.after", "m2.after", "m1.after",
                "m3.after_build", "m2.after_build", "m1.after_build",
            ]
        );
        assert!(response.has_header("X-m1"));
    }

    #[tokio::test]
    async fn test_short_circuit_runs_after_for_executed_only() {
        let (pipeline, log) = pipeline(Some("m2"));
        let ctx = RequestContext::new(HttpRequest::new("POST", "/"));

        let reply = pipeline.before(&ctx).await.unwrap().unwrap();
        assert_eq!(reply.status(), 403);
        pipeline.after(&ctx, reply).await.unwrap();

        assert_eq!(*log.lock(), ["m1.before", "m2.before", "m2.after", "m1.after"]);
        assert_eq!(ctx.executed_middleware(), [0, 1]);
    }

    #[tokio::test]
    async fn test_blueprint_gating() {
        let (mut pipeline, log) = pipeline(None);
        pipeline.group("web", ["m1", "m2", "m3"]).group("static", ["m1"]);

        let ctx = ctx_with_blueprint("static");
        pipeline.before(&ctx).await.unwrap();
        pipeline.after(&ctx, HttpResponse::ok().into()).await.unwrap();

        assert_eq!(*log.lock(), ["m1.before", "m1.after"]);
    }

    #[tokio::test]
    async fn test_named_middleware_without_group_is_skipped() {
        let (pipeline, log) = pipeline(None);

        let ctx = ctx_with_blueprint("api");
        pipeline.before(&ctx).await.unwrap();
        pipeline.after(&ctx, HttpResponse::ok().into()).await.unwrap();

        assert!(log.lock().is_empty());
        assert!(ctx.executed_middleware().is_empty());
    }

    #[test]
    fn test_should_skip_rules() {
        let mut pipeline = MiddlewarePipeline::new();
        pipeline.group("api", ["cors"]);

        assert!(!pipeline.should_skip(None, Some("api")));
        assert!(!pipeline.should_skip(Some("cors"), None));
        assert!(!pipeline.should_skip(Some("cors"), Some("api")));
        assert!(pipeline.should_skip(Some("session"), Some("api")));
        assert!(pipeline.should_skip(Some("cors"), Some("ws")));
    }
}
