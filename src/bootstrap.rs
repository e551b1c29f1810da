//! Boot-time wiring from configuration to an [`HttpKernel`].
//!
//! [`register_builtin_middleware`] puts every middleware shipped with the
//! framework into a [`MiddlewareFactoryRegistry`] under its config name.
//! [`Bootstrap`] then resolves `middleware.GLOBAL`, `middleware.MIDDLEWARE_GROUPS`
//! and `middleware.ROUTE` against that registry and assembles the kernel.

use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use trellis_cache::{CacheConfig, CacheResult, FileCacheStore};
use trellis_compression::{CompressionConfig, CompressionMiddleware};
use trellis_config::ConfigManager;
use trellis_core::{
    Application, AuthMiddleware, AuthService, ErrorHandler, GuestMiddleware, HttpKernel, Middleware,
    MiddlewareFactoryRegistry, Result, Router, UserProvider, Views,
};
use trellis_core::logging::{LogConfig, WorkerGuard};
use trellis_csrf::{CsrfConfig, CsrfMiddleware};
use trellis_ratelimit::{RateLimitConfig, RateLimitMiddleware};
use trellis_security::{CorsConfig, CorsMiddleware, SecurityHeadersMiddleware, SecurityLoggerMiddleware};
use trellis_session::{SessionConfig, SessionIdentityResolver, SessionMiddleware};

pub const DEFAULT_LOGIN_URL: &str = "/login";
pub const DEFAULT_HOME_URL: &str = "/dashboard";

/// Session-backed [`AuthService`] using `auth.USER_CACHE_TTL` (seconds).
pub fn auth_service(config: &ConfigManager, provider: Arc<dyn UserProvider>) -> Arc<AuthService> {
    let ttl: u64 = config.get_or("auth.USER_CACHE_TTL", 300);
    Arc::new(
        AuthService::new(provider, Arc::new(SessionIdentityResolver::new()))
            .with_cache_ttl(Duration::from_secs(ttl)),
    )
}

/// Register the built-in middleware factories.
///
/// | Name | Enabled by |
/// |---|---|
/// | `session` | always |
/// | `csrf` | `security.CSRF_ENABLED` |
/// | `cors` | `security.CORS_ENABLED` or `app.APP_DEBUG` |
/// | `security_headers` | always |
/// | `security_logger` | `app.SECURITY_LOGGING_ENABLED` (default on) |
/// | `rate_limit` | `app.RATE_LIMIT_ENABLED` |
/// | `compression` | `app.COMPRESSION_ENABLED` |
/// | `auth` | always |
/// | `guest` | always |
pub fn register_builtin_middleware(registry: &mut MiddlewareFactoryRegistry, auth: Arc<AuthService>) {
    registry
        .register("session", |config: &ConfigManager| {
            let middleware = SessionMiddleware::new(SessionConfig::from_config(config)?)?;
            Ok(Some(Arc::new(middleware) as Arc<dyn Middleware>))
        })
        .register("csrf", |config: &ConfigManager| {
            if !CsrfConfig::enabled(config) {
                return Ok(None);
            }
            let middleware = CsrfMiddleware::new(CsrfConfig::from_config(config)?);
            Ok(Some(Arc::new(middleware) as Arc<dyn Middleware>))
        })
        .register("cors", |config: &ConfigManager| {
            if !CorsConfig::enabled(config) {
                return Ok(None);
            }
            Ok(Some(Arc::new(CorsMiddleware::from_config(config)?) as Arc<dyn Middleware>))
        })
        .register("security_headers", |config: &ConfigManager| {
            let middleware = SecurityHeadersMiddleware::from_config(config)?;
            Ok(Some(Arc::new(middleware) as Arc<dyn Middleware>))
        })
        .register("security_logger", |config: &ConfigManager| {
            if !SecurityLoggerMiddleware::enabled(config) {
                return Ok(None);
            }
            Ok(Some(Arc::new(SecurityLoggerMiddleware::from_config(config)?) as Arc<dyn Middleware>))
        })
        .register("rate_limit", |config: &ConfigManager| {
            if !RateLimitConfig::enabled(config) {
                return Ok(None);
            }
            Ok(Some(Arc::new(RateLimitMiddleware::from_config(config)?) as Arc<dyn Middleware>))
        })
        .register("compression", |config: &ConfigManager| {
            if !CompressionConfig::enabled(config) {
                return Ok(None);
            }
            let middleware = CompressionMiddleware::with_config(CompressionConfig::from_config(config));
            Ok(Some(Arc::new(middleware) as Arc<dyn Middleware>))
        });

    let guest_auth = Arc::clone(&auth);
    registry
        .register("auth", move |config: &ConfigManager| {
            let login: String = config.get_or("auth.LOGIN_URL", DEFAULT_LOGIN_URL.to_string());
            Ok(Some(Arc::new(AuthMiddleware::new(Arc::clone(&auth), login)) as Arc<dyn Middleware>))
        })
        .register("guest", move |config: &ConfigManager| {
            let home: String = config.get_or("auth.HOME_URL", DEFAULT_HOME_URL.to_string());
            Ok(Some(
                Arc::new(GuestMiddleware::new(Arc::clone(&guest_auth), home)) as Arc<dyn Middleware>,
            ))
        });
}

/// Open the file cache configured by `cache.PATH` and `cache.TTL`.
pub async fn file_cache(config: &ConfigManager) -> CacheResult<Arc<FileCacheStore>> {
    Ok(Arc::new(FileCacheStore::new(CacheConfig::from_config(config)).await?))
}

/// Assembles an application from configuration and a route table.
///
/// ```no_run
/// use std::sync::Arc;
/// use trellis::prelude::*;
///
/// # async fn run() -> Result<()> {
/// let config = ConfigManager::new();
/// config.set("middleware.GLOBAL", vec!["session", "security_headers"])?;
///
/// let mut router = Router::new();
/// router.get("/", handler(|_| async { Ok("<h1>Home</h1>") }));
///
/// let boot = Bootstrap::new(config, Arc::new(InMemoryUserProvider::new()));
/// let _logs = boot.init_logging()?;
/// let app = boot.application(router)?;
/// app.listen("127.0.0.1:8000".parse().unwrap()).await
/// # }
/// ```
pub struct Bootstrap {
    config: ConfigManager,
    factories: MiddlewareFactoryRegistry,
    auth: Arc<AuthService>,
    cache: Option<Arc<FileCacheStore>>,
    views: Option<Views>,
}

impl Bootstrap {
    /// Start from the built-in middleware factories.
    pub fn new(config: ConfigManager, provider: Arc<dyn UserProvider>) -> Self {
        let auth = auth_service(&config, provider);
        let mut factories = MiddlewareFactoryRegistry::new();
        register_builtin_middleware(&mut factories, Arc::clone(&auth));

        Self {
            config,
            factories,
            auth,
            cache: None,
            views: None,
        }
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    /// Install the global log subscriber from the `logging.*` keys.
    ///
    /// Hold the guard until shutdown; dropping it stops the writer thread.
    pub fn init_logging(&self) -> io::Result<WorkerGuard> {
        LogConfig::from_config(&self.config).init()
    }

    pub fn auth(&self) -> &Arc<AuthService> {
        &self.auth
    }

    /// The factory registry, for registering application middleware.
    pub fn middleware(&mut self) -> &mut MiddlewareFactoryRegistry {
        &mut self.factories
    }

    /// Expose a cache store to handlers through `CacheExt`.
    pub fn with_cache(mut self, store: Arc<FileCacheStore>) -> Self {
        self.cache = Some(store);
        self
    }

    pub fn with_views(mut self, views: Views) -> Self {
        self.views = Some(views);
        self
    }

    /// Build the kernel. Fails on an unknown middleware name in strict mode,
    /// a route referencing an unregistered middleware, or an invalid route.
    pub fn kernel(self, router: Router) -> Result<HttpKernel> {
        let pipeline = self.factories.build_pipeline(&self.config)?;
        let route_middleware = self.factories.build_route_registry(&self.config)?;
        let routes = router.build()?;

        debug!(
            global = ?pipeline.names(),
            route = ?route_middleware.registered(),
            "Middleware resolved"
        );

        let mut kernel = HttpKernel::new(routes, pipeline, route_middleware)?
            .with_error_handler(ErrorHandler::from_config(&self.config))
            .with_extension_arc(Arc::clone(&self.auth));

        if let Some(views) = self.views {
            kernel = kernel.with_views(views);
        }
        if let Some(cache) = self.cache {
            kernel = kernel.with_extension_arc(cache);
        }

        info!(routes = kernel.routes().count(), "Kernel booted");
        Ok(kernel)
    }

    pub fn application(self, router: Router) -> Result<Application> {
        Ok(Application::new(self.kernel(router)?))
    }
}
