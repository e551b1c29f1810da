//! Boot-time route registrar.
//!
//! ```
//! use trellis_core::{handler, HttpResponse, RouteGroup, Router};
//!
//! let mut router = Router::new();
//! router.group(RouteGroup::new().prefix("api").blueprint("api"), |r| {
//!     r.get("users/{id}", handler(|_| async { Ok(HttpResponse::ok()) }))
//!         .where_number("id")
//!         .name("users.show");
//! });
//! let routes = router.build().unwrap();
//! assert!(routes.has_named_route("api.users.show"));
//! ```

use crate::handler::{HandlerFn, handler};
use crate::route::Route;
use crate::route_collection::RouteCollection;
use crate::route_constraint;
use crate::route_group::RouteGroup;
use crate::response_helper::ResponseHelper;
use crate::Result;
use std::collections::HashMap;

const ANY_METHODS: &[&str] = &["GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"];

/// Collects route definitions while the application boots.
///
/// Routes stay mutable until [`Router::build`] turns them into a
/// read-only [`RouteCollection`].
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
    group_stack: Vec<RouteGroup>,
    patterns: HashMap<String, String>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a GET route; HEAD is registered alongside.
    pub fn get(&mut self, uri: &str, handler: HandlerFn) -> &mut Route {
        self.add_route(["GET", "HEAD"], uri, handler)
    }

    pub fn post(&mut self, uri: &str, handler: HandlerFn) -> &mut Route {
        self.add_route(["POST"], uri, handler)
    }

    pub fn put(&mut self, uri: &str, handler: HandlerFn) -> &mut Route {
        self.add_route(["PUT"], uri, handler)
    }

    pub fn patch(&mut self, uri: &str, handler: HandlerFn) -> &mut Route {
        self.add_route(["PATCH"], uri, handler)
    }

    pub fn delete(&mut self, uri: &str, handler: HandlerFn) -> &mut Route {
        self.add_route(["DELETE"], uri, handler)
    }

    pub fn options(&mut self, uri: &str, handler: HandlerFn) -> &mut Route {
        self.add_route(["OPTIONS"], uri, handler)
    }

    pub fn any(&mut self, uri: &str, handler: HandlerFn) -> &mut Route {
        self.add_route(ANY_METHODS.iter().copied(), uri, handler)
    }

    pub fn match_methods(&mut self, methods: &[&str], uri: &str, handler: HandlerFn) -> &mut Route {
        self.add_route(methods.iter().copied(), uri, handler)
    }

    /// Register a route that redirects to `destination`.
    pub fn redirect(&mut self, uri: &str, destination: &str, status: u16) -> &mut Route {
        let destination = destination.to_string();
        let name = format!("redirect.{}", uri.trim_matches('/').replace('/', "."));
        let route = self.get(
            uri,
            handler(move |_| {
                let destination = destination.clone();
                async move { Ok(ResponseHelper::redirect(&destination, status)) }
            }),
        );
        route.name(&name);
        route
    }

    pub fn permanent_redirect(&mut self, uri: &str, destination: &str) -> &mut Route {
        self.redirect(uri, destination, 301)
    }

    /// Catch-all route, matched only after every other route missed.
    pub fn fallback(&mut self, handler: HandlerFn) -> &mut Route {
        let route = self.any("{path}", handler);
        route.where_("path", route_constraint::PATH).name("fallback");
        route.mark_fallback();
        route
    }

    /// Register routes inside a group. Attributes of every open group are
    /// applied outermost first.
    pub fn group<F>(&mut self, group: RouteGroup, routes: F)
    where
        F: FnOnce(&mut Router),
    {
        self.group_stack.push(group);
        routes(self);
        self.group_stack.pop();
    }

    /// Global constraint for a parameter name, used by routes that do not
    /// declare their own.
    pub fn pattern(&mut self, param: &str, pattern: &str) -> &mut Self {
        self.patterns.insert(param.to_string(), pattern.to_string());
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn add_route<I, S>(&mut self, methods: I, uri: &str, handler: HandlerFn) -> &mut Route
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut route = Route::new(methods, uri, handler);
        self.apply_groups(&mut route);
        self.routes.push(route);
        let last = self.routes.len() - 1;
        &mut self.routes[last]
    }

    fn apply_groups(&self, route: &mut Route) {
        let mut name_prefix = String::new();

        for group in &self.group_stack {
            if let Some(prefix) = &group.prefix {
                route.prefix(prefix);
            }
            route.middleware(group.middleware.iter().cloned());
            if let Some(prefix) = group.name_prefix() {
                name_prefix.push_str(&prefix);
            }
            if let Some(domain) = &group.domain {
                route.domain(domain);
            }
            if let Some(blueprint) = &group.blueprint {
                route.blueprint(blueprint);
            }
            for (param, pattern) in &group.wheres {
                route.where_(param, pattern);
            }
        }

        if !name_prefix.is_empty() {
            route.set_group_name_prefix(name_prefix);
        }
    }

    /// Freeze the registered routes into a [`RouteCollection`].
    ///
    /// Routes without a blueprint are assigned one from their group name
    /// (`api.auth.` gives `api`), then their URI (`api/...`, `ws/...`),
    /// defaulting to `web`.
    pub fn build(self) -> Result<RouteCollection> {
        let mut collection = RouteCollection::new();

        for mut route in self.routes {
            for (param, pattern) in &self.patterns {
                if route.parameter_names().contains(param) && !route.wheres().contains_key(param) {
                    route.where_(param, pattern);
                }
            }

            if route.get_blueprint().is_none() {
                let blueprint = default_blueprint(&route);
                route.blueprint(&blueprint);
            }

            collection.add(route)?;
        }

        Ok(collection)
    }
}

fn default_blueprint(route: &Route) -> String {
    if route.has_group_name_prefix() {
        if let Some(first) = route
            .group_name_prefix()
            .and_then(|p| p.split('.').next())
            .filter(|s| !s.is_empty())
        {
            return first.to_string();
        }
    }

    let uri = route.uri();
    if uri == "api" || uri.starts_with("api/") {
        "api".to_string()
    } else if uri == "ws" || uri.starts_with("ws/") {
        "ws".to_string()
    } else {
        "web".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HttpResponse;

    fn ok() -> HandlerFn {
        handler(|_| async { Ok(HttpResponse::ok()) })
    }

    #[test]
    fn test_get_registers_head() {
        let mut router = Router::new();
        router.get("/", ok());
        assert_eq!(router.routes()[0].methods(), ["GET", "HEAD"]);
    }

    #[test]
    fn test_nested_groups() {
        let mut router = Router::new();
        router.group(
            RouteGroup::new().prefix("api").middleware(["throttle"]),
            |r| {
                r.group(RouteGroup::new().prefix("auth").middleware(["auth"]), |r| {
                    r.get("me", ok()).name("me");
                });
            },
        );

        let route = &router.routes()[0];
        assert_eq!(route.uri(), "api/auth/me");
        assert_eq!(route.route_middleware(), ["throttle", "auth"]);
        assert_eq!(route.get_name(), Some("api.auth.me"));
    }

    #[test]
    fn test_group_blueprint_and_wheres() {
        let mut router = Router::new();
        router.group(
            RouteGroup::new().blueprint("static").where_("file", ".*"),
            |r| {
                r.get("assets/{file}", ok());
            },
        );
        let routes = router.build().unwrap();
        let (route, params) = routes.match_route("/assets/css/app.css", "GET").unwrap();
        assert_eq!(route.get_blueprint(), Some("static"));
        assert_eq!(params["file"], "css/app.css");
    }

    #[test]
    fn test_default_blueprints() {
        let mut router = Router::new();
        router.get("api/status", ok());
        router.get("about", ok());
        router.group(RouteGroup::new().name("admin."), |r| {
            r.get("panel", ok());
        });
        let routes = router.build().unwrap();

        let blueprints: Vec<_> = routes
            .routes()
            .iter()
            .map(|r| r.get_blueprint().unwrap_or_default().to_string())
            .collect();
        assert_eq!(blueprints, ["api", "web", "admin"]);
    }

    #[test]
    fn test_global_pattern() {
        let mut router = Router::new();
        router.pattern("id", "[0-9]+");
        router.get("users/{id}", ok());
        router.get("tags/{id}", ok()).where_alpha("id");
        let routes = router.build().unwrap();

        assert!(routes.match_route("/users/12", "GET").is_some());
        assert!(routes.match_route("/users/abc", "GET").is_none());
        assert!(routes.match_route("/tags/abc", "GET").is_some());
    }

    #[test]
    fn test_redirect_and_fallback() {
        let mut router = Router::new();
        router.permanent_redirect("old/home", "/home");
        router.fallback(ok());
        let routes = router.build().unwrap();

        assert!(routes.has_named_route("redirect.old.home"));
        let (route, _) = routes.match_route("/anything/at/all", "POST").unwrap();
        assert!(route.is_fallback());
    }

    #[test]
    fn test_build_rejects_duplicate_names() {
        let mut router = Router::new();
        router.get("a", ok()).name("same");
        router.get("b", ok()).name("same");
        assert!(router.build().is_err());
    }
}
