// Trellis - a Laravel-inspired request pipeline for Rust
//
// Routing with groups and blueprints, a three-phase middleware pipeline,
// task-local request context, response building, and sessions with
// rotating CSRF tokens.

// Re-export core functionality
pub use trellis_core::*;

pub mod bootstrap;

pub use bootstrap::{Bootstrap, auth_service, file_cache, register_builtin_middleware};

// Re-export the member crates
pub use trellis_cache as cache;
pub use trellis_compression as compression;
pub use trellis_config as config;
pub use trellis_csrf as csrf;
pub use trellis_ratelimit as ratelimit;
pub use trellis_security as security;
pub use trellis_session as session;

// Prelude for common imports
pub mod prelude {
    pub use crate::bootstrap::Bootstrap;
    pub use crate::{
        Application, AuthService, ConfigManager, Cookie, Error, HttpKernel, HttpRequest, HttpResponse,
        InMemoryUserProvider, Middleware, Reply, RequestContext, ResponseBuilder, ResponseHelper, Result,
        Route, RouteGroup, Router, SameSite, handler,
    };
    pub use trellis_cache::{CacheExt, CacheStore};
    pub use trellis_csrf::CSRF_TOKEN_KEY;
    pub use trellis_session::SessionExt;
}
