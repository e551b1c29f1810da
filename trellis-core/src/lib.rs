//! Core of the Trellis web framework.
//!
//! A request flows through these pieces:
//!
//! 1. [`RouteCollection`] resolves the method and path to a [`Route`].
//! 2. A [`RequestContext`] is created and bound to the task.
//! 3. [`MiddlewarePipeline`] runs the global before-phase, gated by the
//!    route's blueprint.
//! 4. [`RouteMiddlewareRegistry`] wraps the handler with the route's own
//!    middleware.
//! 5. The after-phase runs, the [`Reply`] is built into an
//!    [`HttpResponse`], and the after-build phase runs on the final bytes.
//!
//! [`HttpKernel`] drives the sequence and [`Application`] serves it over
//! HTTP/1.1.

pub mod analysis;
pub mod application;
pub mod auth;
pub mod context;
pub mod cookie;
pub mod error;
pub mod error_handler;
pub mod extensions;
pub mod handler;
pub mod http;
pub mod kernel;
pub mod logging;
pub mod middleware;
pub mod middleware_factory;
pub mod middleware_registry;
pub mod pipeline;
pub mod response;
pub mod response_helper;
pub mod route;
pub mod route_collection;
pub mod route_constraint;
pub mod route_group;
pub mod router;
pub mod status;
pub mod view;

pub use analysis::{RequestAnalysis, ResponseFormat, UserAgentType};
pub use application::Application;
pub use auth::{AuthMiddleware, AuthService, GuestMiddleware, IdentityResolver, InMemoryUserProvider, UserProvider};
pub use context::RequestContext;
pub use cookie::{Cookie, SameSite};
pub use error::{Error, Result};
pub use error_handler::ErrorHandler;
pub use extensions::Extensions;
pub use handler::{BoxFuture, HandlerFn, handler};
pub use http::{HttpRequest, HttpResponse};
pub use kernel::HttpKernel;
pub use middleware::Middleware;
pub use middleware_factory::{MiddlewareFactory, MiddlewareFactoryRegistry};
pub use middleware_registry::RouteMiddlewareRegistry;
pub use pipeline::MiddlewarePipeline;
pub use response::{Content, Reply, ResponseBuilder, ResponseType};
pub use response_helper::ResponseHelper;
pub use route::Route;
pub use route_collection::RouteCollection;
pub use route_group::RouteGroup;
pub use router::Router;
pub use status::HttpStatus;
pub use view::{InMemoryViews, ViewRenderer, Views};

pub use trellis_config::ConfigManager;
