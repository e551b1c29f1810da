//! Request entry point.
//!
//! [`HttpKernel::handle`] runs one request through the whole pipeline:
//! route resolution, global before-phase, route-scoped middleware and the
//! handler, after-phase, build, after-build. Errors raised anywhere before
//! the build become error replies and still flow through the remaining
//! phases.

use crate::context::RequestContext;
use crate::error_handler::ErrorHandler;
use crate::extensions::Extensions;
use crate::middleware_registry::RouteMiddlewareRegistry;
use crate::pipeline::MiddlewarePipeline;
use crate::response::Reply;
use crate::route_collection::RouteCollection;
use crate::view::Views;
use crate::{Error, HttpRequest, HttpResponse, Result};
use std::sync::Arc;
use std::time::Instant;
use crate::logging::{debug, info};

pub struct HttpKernel {
    routes: Arc<RouteCollection>,
    pipeline: Arc<MiddlewarePipeline>,
    route_middleware: Arc<RouteMiddlewareRegistry>,
    error_handler: ErrorHandler,
    shared: Extensions,
}

impl HttpKernel {
    /// Assemble a kernel, checking every route's middleware names against
    /// the route registry.
    pub fn new(
        routes: RouteCollection,
        pipeline: MiddlewarePipeline,
        route_middleware: RouteMiddlewareRegistry,
    ) -> Result<Self> {
        for route in routes.routes() {
            route_middleware.validate(route.route_middleware(), &route.uri())?;
        }

        Ok(Self {
            routes: Arc::new(routes),
            pipeline: Arc::new(pipeline),
            route_middleware: Arc::new(route_middleware),
            error_handler: ErrorHandler::default(),
            shared: Extensions::new(),
        })
    }

    pub fn with_error_handler(mut self, error_handler: ErrorHandler) -> Self {
        self.error_handler = error_handler;
        self
    }

    /// Template renderer used by view responses and error pages.
    pub fn with_views(mut self, views: Views) -> Self {
        self.error_handler = self.error_handler.with_views(views.clone());
        self.shared.insert(views);
        self
    }

    /// Attach an application-wide service to every request context.
    pub fn with_extension<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.shared.insert(value);
        self
    }

    pub fn with_extension_arc<T: Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.shared.insert_arc(value);
        self
    }

    pub fn routes(&self) -> &RouteCollection {
        &self.routes
    }

    pub fn pipeline(&self) -> &MiddlewarePipeline {
        &self.pipeline
    }

    pub fn route_middleware(&self) -> &RouteMiddlewareRegistry {
        &self.route_middleware
    }

    pub fn error_handler(&self) -> &ErrorHandler {
        &self.error_handler
    }

    /// Handle one request. Never fails: every error becomes a response.
    pub async fn handle(&self, mut request: HttpRequest) -> HttpResponse {
        let started = Instant::now();
        let method = request.method.clone();
        let path = request.path.clone();

        let route = self
            .routes
            .match_request(&request.path, &request.method, request.header("Host"))
            .map(|(route, params)| {
                request.path_params = params;
                route
            });

        let ctx = RequestContext::with_extensions(request, self.shared.clone());
        ctx.set_route(route);

        let mut response = ctx.clone().scope(self.process(ctx)).await;

        if method == "HEAD" {
            response.body.clear();
        }

        info!(
            method = %method,
            path = %path,
            status = response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request handled"
        );
        response
    }

    async fn process(&self, ctx: RequestContext) -> HttpResponse {
        let reply = match self.pipeline.before(&ctx).await {
            Ok(Some(reply)) => reply,
            Ok(None) => self.dispatch(&ctx).await,
            Err(e) => self.error_handler.handle(&ctx, &e),
        };

        let reply = match self.pipeline.after(&ctx, reply).await {
            Ok(reply) => reply,
            Err(e) => self.error_handler.handle(&ctx, &e),
        };

        let mut response = reply.build(&ctx);
        self.pipeline.after_build(&ctx, &mut response).await;
        response
    }

    async fn dispatch(&self, ctx: &RequestContext) -> Reply {
        let Some(route) = ctx.route() else {
            debug!(method = %ctx.method(), path = %ctx.path(), "No route matched");
            let err = Error::NotFound("The requested resource was not found".to_string());
            return self.error_handler.handle(ctx, &err);
        };

        let handler = self
            .route_middleware
            .wrap_handler(Arc::clone(route.handler()), route.route_middleware());

        match handler(ctx.clone()).await {
            Ok(reply) => reply,
            Err(e) => self.error_handler.handle(ctx, &e),
        }
    }
}
