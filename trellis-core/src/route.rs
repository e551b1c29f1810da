//! A single route definition with a fluent configuration API.

use crate::handler::HandlerFn;
use crate::route_constraint::{self, PARAM_TOKEN, ParamType, SEGMENT};
use crate::{Error, Result};
use regex::Regex;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// Blueprints whose name is also a URI prefix.
const PREFIXED_BLUEPRINTS: &[&str] = &["api", "ws"];

/// A route: methods, URI pattern, handler and the metadata the pipeline
/// reads (name, route middleware, blueprint).
///
/// Routes are configured while the router is open and are immutable once
/// the route table is built.
pub struct Route {
    methods: Vec<String>,
    uri: String,
    prefix: String,
    parameter_names: Vec<String>,
    wheres: HashMap<String, String>,
    defaults: HashMap<String, String>,
    handler: HandlerFn,
    action: Option<String>,
    name: Option<String>,
    middleware: Vec<String>,
    blueprint: Option<String>,
    group_name_prefix: Option<String>,
    domain: Option<String>,
    fallback: bool,
    matcher: OnceLock<Regex>,
}

impl Route {
    pub fn new<I, S>(methods: I, uri: &str, handler: HandlerFn) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let uri = uri.trim_matches('/').to_string();
        Self {
            methods: methods
                .into_iter()
                .map(|m| m.as_ref().to_uppercase())
                .collect(),
            parameter_names: route_constraint::parameter_names(&uri),
            uri,
            prefix: String::new(),
            wheres: HashMap::new(),
            defaults: HashMap::new(),
            handler,
            action: None,
            name: None,
            middleware: Vec::new(),
            blueprint: None,
            group_name_prefix: None,
            domain: None,
            fallback: false,
            matcher: OnceLock::new(),
        }
    }

    // ---- fluent configuration ----

    /// Name the route. The enclosing group's name prefix is prepended
    /// unless the name already starts with it.
    pub fn name(&mut self, name: &str) -> &mut Self {
        self.name = Some(match &self.group_name_prefix {
            Some(prefix) if !name.starts_with(prefix.as_str()) => format!("{}{}", prefix, name),
            _ => name.to_string(),
        });
        self
    }

    pub fn middleware<I, S>(&mut self, names: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.middleware.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn where_(&mut self, param: &str, pattern: &str) -> &mut Self {
        self.wheres.insert(param.to_string(), pattern.to_string());
        self
    }

    pub fn where_number(&mut self, param: &str) -> &mut Self {
        self.where_(param, route_constraint::NUMBER)
    }

    pub fn where_alpha(&mut self, param: &str) -> &mut Self {
        self.where_(param, route_constraint::ALPHA)
    }

    pub fn where_alpha_numeric(&mut self, param: &str) -> &mut Self {
        self.where_(param, route_constraint::ALPHA_NUMERIC)
    }

    pub fn where_uuid(&mut self, param: &str) -> &mut Self {
        self.where_(param, route_constraint::UUID)
    }

    pub fn where_in<I, S>(&mut self, param: &str, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let pattern = route_constraint::one_of(values);
        self.where_(param, &pattern)
    }

    pub fn defaults(&mut self, param: &str, value: &str) -> &mut Self {
        self.defaults.insert(param.to_string(), value.to_string());
        self
    }

    pub fn domain(&mut self, domain: &str) -> &mut Self {
        self.domain = Some(domain.to_string());
        self
    }

    /// Prepend a prefix segment; nested groups accumulate `outer/inner`.
    pub fn prefix(&mut self, prefix: &str) -> &mut Self {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return self;
        }
        self.prefix = if self.prefix.is_empty() {
            prefix.to_string()
        } else {
            format!("{}/{}", self.prefix, prefix)
        };
        self
    }

    pub fn blueprint(&mut self, blueprint: &str) -> &mut Self {
        self.blueprint = Some(blueprint.to_string());
        self
    }

    /// Record a `Controller@method` action for listings and lookups.
    pub fn action(&mut self, action: &str) -> &mut Self {
        self.action = Some(action.to_string());
        self
    }

    pub(crate) fn set_group_name_prefix(&mut self, prefix: String) {
        self.group_name_prefix = Some(prefix);
    }

    pub(crate) fn has_group_name_prefix(&self) -> bool {
        self.group_name_prefix.is_some()
    }

    pub(crate) fn mark_fallback(&mut self) {
        self.fallback = true;
    }

    // ---- accessors ----

    pub fn methods(&self) -> &[String] {
        &self.methods
    }

    pub fn get_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn route_middleware(&self) -> &[String] {
        &self.middleware
    }


    pub fn get_blueprint(&self) -> Option<&str> {
        self.blueprint.as_deref()
    }

    pub fn group_name_prefix(&self) -> Option<&str> {
        self.group_name_prefix.as_deref()
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    pub fn wheres(&self) -> &HashMap<String, String> {
        &self.wheres
    }

    pub fn get_defaults(&self) -> &HashMap<String, String> {
        &self.defaults
    }

    pub fn get_domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Whether a request for `host` may use this route. Routes without a
    /// domain accept any host; the port is ignored.
    pub fn matches_host(&self, host: Option<&str>) -> bool {
        let Some(domain) = &self.domain else {
            return true;
        };
        host.map(|h| h.rsplit_once(':').map_or(h, |(name, _)| name))
            .is_some_and(|name| name.eq_ignore_ascii_case(domain))
    }

    pub fn handler(&self) -> &HandlerFn {
        &self.handler
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    pub fn has_parameters(&self) -> bool {
        !self.parameter_names.is_empty()
    }

    /// `Controller@method`, or `Closure` for inline handlers.
    pub fn action_name(&self) -> &str {
        self.action.as_deref().unwrap_or("Closure")
    }

    /// Full URI without leading or trailing slashes: prefix, URI and, for
    /// the `api`/`ws` blueprints, the blueprint segment.
    pub fn uri(&self) -> String {
        let mut uri = if self.prefix.is_empty() {
            self.uri.clone()
        } else {
            format!("{}/{}", self.prefix, self.uri)
                .trim_matches('/')
                .to_string()
        };

        if let Some(blueprint) = self.blueprint.as_deref() {
            if PREFIXED_BLUEPRINTS.contains(&blueprint)
                && uri != blueprint
                && !uri.starts_with(&format!("{}/", blueprint))
            {
                uri = format!("{}/{}", blueprint, uri)
                    .trim_matches('/')
                    .to_string();
            }
        }

        uri
    }

    /// The accumulated prefix with a leading blueprint segment removed.
    ///
    /// `api/auth` under blueprint `api` yields `auth`; a prefix equal to the
    /// blueprint yields `None`.
    pub fn prefix_without_blueprint(&self) -> Option<String> {
        if self.prefix.is_empty() {
            return None;
        }
        let Some(blueprint) = self.blueprint.as_deref() else {
            return Some(self.prefix.clone());
        };

        match self.prefix.split_once('/') {
            Some((first, rest)) if first == blueprint => {
                (!rest.is_empty()).then(|| rest.to_string())
            }
            None if self.prefix == blueprint => None,
            _ => Some(self.prefix.clone()),
        }
    }

    /// URI with typed placeholders, e.g. `users/<id:int>`.
    pub fn compiled_uri(&self) -> String {
        PARAM_TOKEN
            .replace_all(&self.uri(), |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                match ParamType::classify(self.wheres.get(name).map(String::as_str)) {
                    ParamType::Str => format!("<{}>", name),
                    ty => format!("<{}:{}>", name, ty),
                }
            })
            .into_owned()
    }

    // ---- matching ----

    /// Build the anchored matcher for this route's URI and constraints.
    pub fn compile(&self) -> Result<&Regex> {
        if let Some(regex) = self.matcher.get() {
            return Ok(regex);
        }
        let regex = self.build_matcher()?;
        Ok(self.matcher.get_or_init(|| regex))
    }

    fn param_pattern(&self, name: &str) -> &str {
        self.wheres.get(name).map(String::as_str).unwrap_or(SEGMENT)
    }

    fn build_matcher(&self) -> Result<Regex> {
        let uri = self.uri();
        let mut pattern = String::from("^");

        if uri.is_empty() {
            pattern.push('/');
        }

        for segment in uri.split('/').filter(|s| !s.is_empty()) {
            let whole = PARAM_TOKEN
                .captures(segment)
                .filter(|c| c.get(0).is_some_and(|m| m.as_str() == segment));

            if let Some(caps) = whole {
                let name = &caps[1];
                let group = format!("(?P<{}>{})", name, self.param_pattern(name));
                if caps.get(2).is_some() {
                    pattern.push_str(&format!("(?:/{})?", group));
                } else {
                    pattern.push('/');
                    pattern.push_str(&group);
                }
                continue;
            }

            pattern.push('/');
            let mut last = 0;
            for caps in PARAM_TOKEN.captures_iter(segment) {
                let Some(token) = caps.get(0) else { continue };
                pattern.push_str(&regex::escape(&segment[last..token.start()]));
                let name = &caps[1];
                pattern.push_str(&format!("(?P<{}>{})", name, self.param_pattern(name)));
                if caps.get(2).is_some() {
                    pattern.push('?');
                }
                last = token.end();
            }
            pattern.push_str(&regex::escape(&segment[last..]));
        }

        pattern.push('$');

        Regex::new(&pattern).map_err(|e| Error::InvalidRoutePattern {
            uri: uri.clone(),
            reason: e.to_string(),
        })
    }

    /// Match a request path and method, returning the extracted parameters.
    ///
    /// Missing optional parameters take their declared default.
    pub fn matches(&self, path: &str, method: &str) -> Option<HashMap<String, String>> {
        if !self.methods.iter().any(|m| m.eq_ignore_ascii_case(method)) {
            return None;
        }
        self.match_path(path)
    }

    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let regex = self.compile().ok()?;
        let normalized = format!("/{}", path.trim_matches('/'));
        let caps = regex.captures(&normalized)?;

        let mut params = HashMap::new();
        for name in &self.parameter_names {
            match caps.name(name) {
                Some(m) => {
                    let value = urlencoding::decode(m.as_str())
                        .map(|v| v.into_owned())
                        .unwrap_or_else(|_| m.as_str().to_string());
                    params.insert(name.clone(), value);
                }
                None => {
                    if let Some(default) = self.defaults.get(name) {
                        params.insert(name.clone(), default.clone());
                    }
                }
            }
        }
        Some(params)
    }

    /// Route summary for listings.
    pub fn describe(&self) -> Value {
        let uri = self.uri();
        let mut entry = json!({
            "name": self.name,
            "uri": if uri.is_empty() { "/".to_string() } else { uri },
            "methods": self.methods,
            "action": self.action_name(),
            "middleware": self.middleware,
            "parameters": self.parameter_names,
        });

        if let Some(obj) = entry.as_object_mut() {
            if let Some(blueprint) = &self.blueprint {
                obj.insert("blueprint".into(), json!(blueprint));
            }
            if let Some(domain) = &self.domain {
                obj.insert("domain".into(), json!(domain));
            }
            if !self.wheres.is_empty() {
                let wheres: Map<String, Value> = self
                    .wheres
                    .iter()
                    .map(|(k, v)| (k.clone(), json!(v)))
                    .collect();
                obj.insert("constraints".into(), Value::Object(wheres));
            }
            if !self.defaults.is_empty() {
                obj.insert("defaults".into(), json!(self.defaults));
            }
        }

        entry
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("methods", &self.methods)
            .field("uri", &self.uri())
            .field("name", &self.name)
            .field("middleware", &self.middleware)
            .field("blueprint", &self.blueprint)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpResponse, handler};

    fn route(methods: &[&str], uri: &str) -> Route {
        Route::new(
            methods.iter().copied(),
            uri,
            handler(|_| async { Ok(HttpResponse::ok()) }),
        )
    }

    #[test]
    fn test_parameters_parsed() {
        let r = route(&["GET"], "/posts/{post}/{comment?}/");
        assert_eq!(r.uri(), "posts/{post}/{comment?}");
        assert_eq!(r.parameter_names(), ["post", "comment"]);
    }

    #[test]
    fn test_name_applies_group_prefix_once() {
        let mut r = route(&["GET"], "me");
        r.set_group_name_prefix("api.auth.".to_string());
        r.name("me");
        assert_eq!(r.get_name(), Some("api.auth.me"));

        r.name("api.auth.profile");
        assert_eq!(r.get_name(), Some("api.auth.profile"));
    }

    #[test]
    fn test_blueprint_uri_prefix() {
        let mut r = route(&["GET"], "users");
        r.blueprint("api");
        assert_eq!(r.uri(), "api/users");

        let mut r = route(&["GET"], "users");
        r.prefix("api").blueprint("api");
        assert_eq!(r.uri(), "api/users");

        let mut r = route(&["GET"], "about");
        r.blueprint("web");
        assert_eq!(r.uri(), "about");
    }

    #[test]
    fn test_prefix_without_blueprint() {
        let mut r = route(&["POST"], "login");
        r.prefix("api").prefix("auth").blueprint("api");
        assert_eq!(r.uri(), "api/auth/login");
        assert_eq!(r.prefix_without_blueprint().as_deref(), Some("auth"));

        let mut r = route(&["GET"], "users");
        r.prefix("api").blueprint("api");
        assert_eq!(r.prefix_without_blueprint(), None);

        let mut r = route(&["GET"], "users");
        r.prefix("admin").blueprint("web");
        assert_eq!(r.prefix_without_blueprint().as_deref(), Some("admin"));
    }

    #[test]
    fn test_compiled_uri() {
        let mut r = route(&["GET"], "files/{id}/{key}/{slug}/{rest}/{name}");
        r.where_number("id")
            .where_uuid("key")
            .where_("slug", route_constraint::SLUG)
            .where_("rest", route_constraint::PATH);
        assert_eq!(
            r.compiled_uri(),
            "files/<id:int>/<key:uuid>/<slug:slug>/<rest:path>/<name>"
        );
    }

    #[test]
    fn test_constraint_enforced() {
        let mut r = route(&["GET"], "users/{id}");
        r.where_number("id");

        assert_eq!(r.matches("/users/42", "GET").unwrap()["id"], "42");
        assert!(r.matches("/users/create", "GET").is_none());
        assert!(r.matches("/users/42", "POST").is_none());
    }

    #[test]
    fn test_optional_parameter_defaults() {
        let mut r = route(&["GET"], "posts/{page?}");
        r.defaults("page", "1");

        assert_eq!(r.match_path("/posts").unwrap()["page"], "1");
        assert_eq!(r.match_path("/posts/3").unwrap()["page"], "3");
    }

    #[test]
    fn test_where_in_and_path() {
        let mut r = route(&["GET"], "docs/{version}/{page}");
        r.where_in("version", ["v1", "v2"])
            .where_("page", route_constraint::PATH);

        let params = r.match_path("/docs/v2/guide/intro").unwrap();
        assert_eq!(params["version"], "v2");
        assert_eq!(params["page"], "guide/intro");
        assert!(r.match_path("/docs/v3/guide").is_none());
    }

    #[test]
    fn test_inline_parameter_and_root() {
        let r = route(&["GET"], "report-{year}.csv");
        assert_eq!(r.match_path("/report-2024.csv").unwrap()["year"], "2024");
        assert!(r.match_path("/report-2024xcsv").is_none());

        let root = route(&["GET"], "/");
        assert!(root.match_path("/").is_some());
        assert!(root.match_path("/x").is_none());
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let mut r = route(&["GET"], "items/{id}");
        r.where_("id", "[0-9");
        assert!(matches!(r.compile(), Err(Error::InvalidRoutePattern { .. })));
        assert!(r.match_path("/items/1").is_none());
    }

    #[test]
    fn test_action_name() {
        let mut r = route(&["GET"], "users");
        assert_eq!(r.action_name(), "Closure");
        r.action("UserController@index");
        assert_eq!(r.action_name(), "UserController@index");
    }
}
