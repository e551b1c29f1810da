//! Per-request context.
//!
//! A [`RequestContext`] is created when a request enters the kernel and
//! dropped when its response leaves. It is cheap to clone; clones share
//! the same state. The kernel binds it to the running task so code without
//! a context parameter can reach it through [`RequestContext::current`].

use crate::analysis::{RequestAnalysis, ResponseFormat, UserAgentType};
use crate::cookie::Cookie;
use crate::extensions::Extensions;
use crate::route::Route;
use crate::{Error, HttpRequest, Result};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock};

tokio::task_local! {
    static CURRENT: RequestContext;
}

#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    request: HttpRequest,
    analysis: OnceLock<RequestAnalysis>,
    state: Mutex<ContextState>,
}

#[derive(Default)]
struct ContextState {
    values: HashMap<String, Value>,
    user: Option<Value>,
    route: Option<Arc<Route>>,
    extensions: Extensions,
    queued_headers: Vec<(String, String)>,
    queued_cookies: Vec<Cookie>,
    executed: Vec<usize>,
}

impl RequestContext {
    pub fn new(request: HttpRequest) -> Self {
        Self::with_extensions(request, Extensions::new())
    }

    /// Create a context pre-seeded with application-wide extensions.
    pub fn with_extensions(request: HttpRequest, extensions: Extensions) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                request,
                analysis: OnceLock::new(),
                state: Mutex::new(ContextState {
                    extensions,
                    ..Default::default()
                }),
            }),
        }
    }

    /// The context bound to the current task, if any.
    pub fn current() -> Option<RequestContext> {
        CURRENT.try_with(|ctx| ctx.clone()).ok()
    }

    /// Run `fut` with this context bound as [`RequestContext::current`].
    ///
    /// The binding ends when `fut` completes, on every exit path.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    pub fn request(&self) -> &HttpRequest {
        &self.inner.request
    }

    pub fn method(&self) -> &str {
        &self.inner.request.method
    }

    pub fn path(&self) -> &str {
        &self.inner.request.path
    }

    pub fn param(&self, name: &str) -> Option<&String> {
        self.inner.request.param(name)
    }

    // ---- key/value state ----

    pub fn get(&self, key: &str, default: Value) -> Value {
        self.inner
            .state
            .lock()
            .values
            .get(key)
            .cloned()
            .unwrap_or(default)
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.inner.state.lock().values.get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .state
            .lock()
            .values
            .insert(key.into(), value.into());
    }

    /// Push onto a list value, creating it when absent.
    pub fn append(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let mut state = self.inner.state.lock();
        match state
            .values
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()))
        {
            Value::Array(items) => {
                items.push(value.into());
                Ok(())
            }
            _ => Err(Error::Context(format!("'{}' does not hold a list", key))),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.state.lock().values.contains_key(key)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.state.lock().values.remove(key)
    }

    pub fn all(&self) -> HashMap<String, Value> {
        self.inner.state.lock().values.clone()
    }

    // ---- user and route ----

    pub fn user(&self) -> Option<Value> {
        self.inner.state.lock().user.clone()
    }

    pub fn set_user(&self, user: Option<Value>) {
        self.inner.state.lock().user = user;
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.lock().user.is_some()
    }

    pub fn route(&self) -> Option<Arc<Route>> {
        self.inner.state.lock().route.clone()
    }

    pub fn set_route(&self, route: Option<Arc<Route>>) {
        self.inner.state.lock().route = route;
    }

    /// Blueprint of the matched route.
    pub fn blueprint(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .route
            .as_ref()
            .and_then(|r| r.get_blueprint().map(str::to_string))
    }

    // ---- typed extensions ----

    pub fn insert_extension<T: Send + Sync + 'static>(&self, value: T) {
        self.inner.state.lock().extensions.insert(value);
    }

    pub fn insert_extension_arc<T: Send + Sync + 'static>(&self, value: Arc<T>) {
        self.inner.state.lock().extensions.insert_arc(value);
    }

    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.inner.state.lock().extensions.get::<T>()
    }

    // ---- queued response state ----

    /// Queue a header for the response, replacing an earlier value.
    pub fn queue_header(&self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let mut state = self.inner.state.lock();
        state
            .queued_headers
            .retain(|(k, _)| !k.eq_ignore_ascii_case(&name));
        state.queued_headers.push((name, value.into()));
    }

    pub fn queued_headers(&self) -> Vec<(String, String)> {
        self.inner.state.lock().queued_headers.clone()
    }

    /// Queue a cookie for the response, replacing one with the same name.
    pub fn queue_cookie(&self, cookie: Cookie) {
        let mut state = self.inner.state.lock();
        state.queued_cookies.retain(|c| c.name != cookie.name);
        state.queued_cookies.push(cookie);
    }

    /// Queue deletion of a cookie on the client.
    pub fn forget_cookie(&self, name: &str) {
        self.queue_cookie(Cookie::removal(name));
    }

    pub fn queued_cookies(&self) -> Vec<Cookie> {
        self.inner.state.lock().queued_cookies.clone()
    }

    // ---- pipeline bookkeeping ----

    /// Record that the global middleware at `index` ran its before-phase.
    pub fn mark_executed(&self, index: usize) {
        self.inner.state.lock().executed.push(index);
    }

    pub fn executed_middleware(&self) -> Vec<usize> {
        self.inner.state.lock().executed.clone()
    }

    // ---- request analysis ----

    pub fn analysis(&self) -> &RequestAnalysis {
        self.inner
            .analysis
            .get_or_init(|| RequestAnalysis::analyze(&self.inner.request))
    }

    pub fn is_ajax(&self) -> bool {
        self.analysis().is_ajax
    }

    pub fn wants_json(&self) -> bool {
        self.analysis().wants_json
    }

    pub fn wants_html(&self) -> bool {
        self.analysis().wants_html
    }

    pub fn preferred_response_format(&self) -> ResponseFormat {
        self.analysis().preferred_response
    }

    pub fn client_ip(&self) -> &str {
        &self.analysis().client_ip
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.analysis().bearer_token.as_deref()
    }

    pub fn user_agent_type(&self) -> UserAgentType {
        self.analysis().user_agent_type
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.inner.request.method)
            .field("path", &self.inner.request.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> RequestContext {
        RequestContext::new(HttpRequest::new("GET", "/"))
    }

    #[test]
    fn test_get_set_has() {
        let ctx = ctx();
        assert_eq!(ctx.get("missing", json!("fallback")), json!("fallback"));

        ctx.set("csrf_token", "abc");
        assert!(ctx.has("csrf_token"));
        assert_eq!(ctx.get("csrf_token", Value::Null), json!("abc"));
        assert_eq!(ctx.get_as::<String>("csrf_token").as_deref(), Some("abc"));
    }

    #[test]
    fn test_append_creates_and_extends_lists() {
        let ctx = ctx();
        ctx.append("trail", "a").unwrap();
        ctx.append("trail", "b").unwrap();
        assert_eq!(ctx.get("trail", Value::Null), json!(["a", "b"]));
    }

    #[test]
    fn test_append_rejects_non_list() {
        let ctx = ctx();
        ctx.set("count", 3);
        assert!(matches!(ctx.append("count", 4), Err(Error::Context(_))));
    }

    #[test]
    fn test_clones_share_state() {
        let a = ctx();
        let b = a.clone();
        b.set_user(Some(json!({"id": 1})));
        assert!(a.is_authenticated());
    }

    #[test]
    fn test_queued_headers_replace_case_insensitively() {
        let ctx = ctx();
        ctx.queue_header("X-Frame-Options", "DENY");
        ctx.queue_header("x-frame-options", "SAMEORIGIN");

        assert_eq!(
            ctx.queued_headers(),
            vec![("x-frame-options".to_string(), "SAMEORIGIN".to_string())]
        );
    }

    #[test]
    fn test_queued_cookies_replace_by_name() {
        let ctx = ctx();
        ctx.queue_cookie(Cookie::new("csrf_token", "one"));
        ctx.queue_cookie(Cookie::new("csrf_token", "two"));
        ctx.forget_cookie("old");

        let cookies = ctx.queued_cookies();
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies[0].value, "two");
        assert!(cookies[1].is_removal());
    }

    #[test]
    fn test_analysis_cached() {
        let ctx = RequestContext::new(
            HttpRequest::new("GET", "/api/me").with_header("Accept", "application/json"),
        );
        assert!(ctx.wants_json());
        assert!(std::ptr::eq(ctx.analysis(), ctx.analysis()));
    }

    #[tokio::test]
    async fn test_current_binding_is_scoped() {
        assert!(RequestContext::current().is_none());

        let ctx = ctx();
        ctx.set("marker", 1);
        let seen = ctx
            .clone()
            .scope(async { RequestContext::current().map(|c| c.get("marker", Value::Null)) })
            .await;

        assert_eq!(seen, Some(json!(1)));
        assert!(RequestContext::current().is_none());
    }
}
