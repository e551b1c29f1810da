//! Config-driven construction of middleware.
//!
//! Middleware are registered under a string key with a constructor closure.
//! At boot the configured names are resolved against this registry; an
//! unknown name fails the boot unless `middleware.STRICT` is false.

use crate::middleware::Middleware;
use crate::middleware_registry::RouteMiddlewareRegistry;
use crate::pipeline::MiddlewarePipeline;
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use trellis_config::ConfigManager;
use crate::logging::{debug, warn};

/// Builds a middleware from configuration. `Ok(None)` means the middleware
/// is disabled by config.
pub type MiddlewareFactory =
    Arc<dyn Fn(&ConfigManager) -> Result<Option<Arc<dyn Middleware>>> + Send + Sync>;

#[derive(Default, Clone)]
pub struct MiddlewareFactoryRegistry {
    factories: HashMap<String, MiddlewareFactory>,
}

/// Whether unknown middleware names are fatal (`middleware.STRICT`).
pub fn strict_mode(config: &ConfigManager) -> bool {
    config.get_or("middleware.STRICT", true)
}

impl MiddlewareFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ConfigManager) -> Result<Option<Arc<dyn Middleware>>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Register an always-enabled, prebuilt instance.
    pub fn register_instance(&mut self, name: impl Into<String>, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.register(name, move |_| Ok(Some(Arc::clone(&middleware))))
    }

    pub fn has(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn create(&self, name: &str, config: &ConfigManager) -> Result<Option<Arc<dyn Middleware>>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::MiddlewareNotFound(name.to_string()))?;
        factory(config)
    }

    fn create_checked(
        &self,
        name: &str,
        config: &ConfigManager,
        strict: bool,
    ) -> Result<Option<Arc<dyn Middleware>>> {
        if !self.has(name) {
            if strict {
                return Err(Error::MiddlewareNotFound(name.to_string()));
            }
            warn!(middleware = %name, "Middleware not registered, skipping");
            return Ok(None);
        }
        let middleware = self.create(name, config)?;
        if middleware.is_none() {
            debug!(middleware = %name, "Middleware disabled by configuration");
        }
        Ok(middleware)
    }

    /// Build the global pipeline from `middleware.GLOBAL` (ordered names)
    /// and `middleware.MIDDLEWARE_GROUPS` (blueprint to names).
    pub fn build_pipeline(&self, config: &ConfigManager) -> Result<MiddlewarePipeline> {
        let strict = strict_mode(config);
        let names: Vec<String> = config.get_or("middleware.GLOBAL", Vec::new());
        let groups: HashMap<String, Vec<String>> =
            config.get_or("middleware.MIDDLEWARE_GROUPS", HashMap::new());

        let mut pipeline = MiddlewarePipeline::new();
        for name in &names {
            if let Some(middleware) = self.create_checked(name, config, strict)? {
                pipeline.add(name.clone(), middleware);
            }
        }
        pipeline.set_groups(groups);

        debug!(middleware = ?pipeline.names(), "Global pipeline built");
        Ok(pipeline)
    }

    /// Build the route-scoped registry from `middleware.ROUTE`, or from
    /// every registered factory when that key is absent.
    pub fn build_route_registry(&self, config: &ConfigManager) -> Result<RouteMiddlewareRegistry> {
        let strict = strict_mode(config);
        let names: Vec<String> = config.get_or("middleware.ROUTE", self.names());

        let mut registry = RouteMiddlewareRegistry::new();
        registry.set_strict(strict);
        for name in &names {
            if let Some(middleware) = self.create_checked(name, config, strict)? {
                registry.register(name.clone(), middleware);
            }
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Noop;

    impl Middleware for Noop {}

    fn registry() -> MiddlewareFactoryRegistry {
        let mut registry = MiddlewareFactoryRegistry::new();
        registry
            .register_instance("session", Arc::new(Noop))
            .register("cors", |config: &ConfigManager| {
                Ok(config
                    .get_or("security.CORS_ENABLED", false)
                    .then(|| Arc::new(Noop) as Arc<dyn Middleware>))
            });
        registry
    }

    #[test]
    fn test_build_pipeline_in_order() {
        let config = ConfigManager::new();
        config.set("middleware.GLOBAL", json!(["session", "cors"])).unwrap();
        config.set("security.CORS_ENABLED", true).unwrap();

        let pipeline = registry().build_pipeline(&config).unwrap();
        assert_eq!(pipeline.names(), ["session", "cors"]);
    }

    #[test]
    fn test_disabled_factory_omitted() {
        let config = ConfigManager::new();
        config.set("middleware.GLOBAL", json!(["session", "cors"])).unwrap();

        let pipeline = registry().build_pipeline(&config).unwrap();
        assert_eq!(pipeline.names(), ["session"]);
    }

    #[test]
    fn test_unknown_name_strict_by_default() {
        let config = ConfigManager::new();
        config.set("middleware.GLOBAL", json!(["session", "nope"])).unwrap();

        let err = registry().build_pipeline(&config).err().unwrap();
        assert!(matches!(err, Error::MiddlewareNotFound(n) if n == "nope"));

        config.set("middleware.STRICT", false).unwrap();
        assert_eq!(registry().build_pipeline(&config).unwrap().names(), ["session"]);
    }

    #[test]
    fn test_route_registry_defaults_to_all_factories() {
        let config = ConfigManager::new();
        config.set("security.CORS_ENABLED", "true").unwrap();
        let routes = registry().build_route_registry(&config).unwrap();
        assert!(routes.has("session"));
        assert!(routes.has("cors"));
        assert!(routes.is_strict());
    }
}
