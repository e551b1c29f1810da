//! The route table.
//!
//! Holds every registered [`Route`] in registration order plus three derived
//! indexes: exact `METHOD:uri` keys for literal routes, names and methods.
//! Domain-scoped routes stay out of the exact index and only match
//! requests for their host.
//! The table is built once at boot and shared read-only afterwards.

use crate::route::Route;
use crate::route_constraint::PARAM_TOKEN;
use crate::{Error, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use crate::logging::error;

#[derive(Debug, Default)]
pub struct RouteCollection {
    routes: Vec<Arc<Route>>,
    exact: HashMap<String, Arc<Route>>,
    by_name: HashMap<String, Arc<Route>>,
    by_method: HashMap<String, Vec<Arc<Route>>>,
    has_domain_routes: bool,
}

fn exact_key(method: &str, uri: &str) -> String {
    format!("{}:{}", method.to_uppercase(), uri.trim_matches('/'))
}

impl RouteCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route, compiling its matcher.
    ///
    /// Fails when the route's pattern does not compile or when another
    /// route already carries the same name.
    pub fn add(&mut self, route: Route) -> Result<Arc<Route>> {
        route.compile()?;

        if let Some(name) = route.get_name() {
            if self.by_name.contains_key(name) {
                error!(name = %name, uri = %route.uri(), "Duplicate route name");
                return Err(Error::DuplicateRouteName(name.to_string()));
            }
        }

        let route = Arc::new(route);
        let uri = route.uri();

        for method in route.methods() {
            if !route.has_parameters() && !route.is_fallback() && route.get_domain().is_none() {
                self.exact
                    .insert(exact_key(method, &uri), Arc::clone(&route));
            }
            self.by_method
                .entry(method.clone())
                .or_default()
                .push(Arc::clone(&route));
        }

        self.has_domain_routes |= route.get_domain().is_some();
        if let Some(name) = route.get_name() {
            self.by_name.insert(name.to_string(), Arc::clone(&route));
        }

        self.routes.push(Arc::clone(&route));
        Ok(route)
    }

    /// Resolve a request path and method to a route and its parameters,
    /// ignoring domain-scoped routes.
    pub fn match_route(
        &self,
        path: &str,
        method: &str,
    ) -> Option<(Arc<Route>, HashMap<String, String>)> {
        self.match_request(path, method, None)
    }

    /// Resolve a request for `host`.
    ///
    /// Routes scoped to `host` are tried first. Then literal routes are
    /// found through the exact index; otherwise routes for the method are
    /// scanned in registration order, with fallback routes tried last.
    pub fn match_request(
        &self,
        path: &str,
        method: &str,
        host: Option<&str>,
    ) -> Option<(Arc<Route>, HashMap<String, String>)> {
        let method = method.to_uppercase();
        let candidates = self.by_method.get(&method);

        let scan = |domain_only: bool, fallback: bool| {
            candidates?
                .iter()
                .filter(|r| r.is_fallback() == fallback && r.matches_host(host))
                .filter(|r| !domain_only || r.get_domain().is_some())
                .find_map(|r| r.match_path(path).map(|params| (Arc::clone(r), params)))
        };

        if self.has_domain_routes && host.is_some() {
            if let Some(found) = scan(true, false) {
                return Some(found);
            }
        }

        if let Some(route) = self.exact.get(&exact_key(&method, path)) {
            return Some((Arc::clone(route), HashMap::new()));
        }

        scan(false, false).or_else(|| scan(false, true))
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<Route>> {
        self.by_name.get(name).cloned()
    }

    pub fn get_by_action(&self, action: &str) -> Option<Arc<Route>> {
        self.routes
            .iter()
            .find(|r| r.action_name() == action)
            .cloned()
    }

    pub fn get_by_method(&self, method: &str) -> &[Arc<Route>] {
        self.by_method
            .get(&method.to_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get_routes_by_uri(&self, uri: &str) -> Vec<Arc<Route>> {
        let uri = uri.trim_matches('/');
        self.routes
            .iter()
            .filter(|r| r.uri() == uri)
            .cloned()
            .collect()
    }

    pub fn has_named_route(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    pub fn count(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Generate a URL for a named route.
    ///
    /// Missing optional parameters fall back to the route default or drop
    /// their segment; parameters the route does not declare are appended
    /// as a query string.
    pub fn url_for(&self, name: &str, params: &HashMap<String, String>) -> Result<String> {
        let route = self
            .get_by_name(name)
            .ok_or_else(|| Error::NotFound(format!("Route [{}] not defined", name)))?;

        let mut segments = Vec::new();
        for segment in route.uri().split('/').filter(|s| !s.is_empty()) {
            let mut rendered = String::new();
            let mut last = 0;
            let mut dropped = false;

            for caps in PARAM_TOKEN.captures_iter(segment) {
                let Some(token) = caps.get(0) else { continue };
                rendered.push_str(&segment[last..token.start()]);
                last = token.end();

                let param = &caps[1];
                let optional = caps.get(2).is_some();
                let value = params
                    .get(param)
                    .or_else(|| route.get_defaults().get(param));

                match value {
                    Some(value) => rendered.push_str(&urlencoding::encode(value)),
                    None if optional => dropped = token.as_str() == segment,
                    None => {
                        return Err(Error::Internal(format!(
                            "Missing required parameter [{}] for route [{}]",
                            param, name
                        )));
                    }
                }
            }
            rendered.push_str(&segment[last..]);

            if !dropped {
                segments.push(rendered);
            }
        }

        let mut url = format!("/{}", segments.join("/"));

        let extra: BTreeMap<&str, &str> = params
            .iter()
            .filter(|(k, _)| !route.parameter_names().contains(k))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        if !extra.is_empty() {
            let query = serde_urlencoded::to_string(&extra)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            url.push('?');
            url.push_str(&query);
        }

        Ok(url)
    }

    /// Route listing, one object per route.
    pub fn to_json(&self) -> Value {
        Value::Array(self.routes.iter().map(|r| r.describe()).collect())
    }
}
