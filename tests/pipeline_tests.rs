//! End-to-end request lifecycle tests driven through `HttpKernel::handle`,
//! with the kernel assembled by `Bootstrap` from configuration.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use trellis::csrf::token_for_cookie;
use trellis::prelude::*;
use trellis::{HandlerFn, RouteMiddlewareRegistry};

const CSRF_SECRET: &str = "pipeline-test-secret";

type Log = Arc<Mutex<Vec<String>>>;

/// Records every phase it takes part in; optionally short-circuits.
struct Recorder {
    name: &'static str,
    log: Log,
    block: bool,
}

#[async_trait]
impl Middleware for Recorder {
    async fn before(&self, _ctx: &RequestContext) -> Result<Option<Reply>> {
        self.log.lock().push(format!("{}.before", self.name));
        if self.block {
            return Ok(Some(ResponseHelper::forbidden("Blocked").into()));
        }
        Ok(None)
    }

    async fn after(&self, _ctx: &RequestContext, reply: Reply) -> Result<Reply> {
        self.log.lock().push(format!("{}.after", self.name));
        Ok(reply)
    }
}

fn recorder(name: &'static str, log: &Log) -> Arc<dyn Middleware> {
    Arc::new(Recorder {
        name,
        log: log.clone(),
        block: false,
    })
}

fn blocker(name: &'static str, log: &Log) -> Arc<dyn Middleware> {
    Arc::new(Recorder {
        name,
        log: log.clone(),
        block: true,
    })
}

fn logging_handler(log: &Log) -> HandlerFn {
    let log = log.clone();
    handler(move |_| {
        let log = log.clone();
        async move {
            log.lock().push("handler".to_string());
            Ok(json!({"ok": true}))
        }
    })
}

/// In-memory sessions, no GC lottery.
fn base_config() -> ConfigManager {
    let config = ConfigManager::new();
    config.set("session.DRIVER", "array").unwrap();
    config.set("session.SESSION_LOTTERY", json!([0, 100])).unwrap();
    config
}

fn users() -> Arc<InMemoryUserProvider> {
    Arc::new(
        InMemoryUserProvider::new()
            .hidden(["password_hash"])
            .with_user("1", json!({"id": 1, "name": "Ada", "email": "ada@example.com", "password_hash": "x"})),
    )
}

fn json_request(method: &str, path: &str) -> HttpRequest {
    HttpRequest::new(method, path).with_header("Accept", "application/json")
}

fn session_cookie(response: &HttpResponse) -> String {
    response
        .cookie("framework_session")
        .map(|c| c.value.clone())
        .expect("session cookie")
}

#[tokio::test]
async fn test_middleware_order_follows_registration() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let config = base_config();
    config.set("middleware.GLOBAL", json!(["m1", "m2", "m3"])).unwrap();
    config
        .set("middleware.MIDDLEWARE_GROUPS", json!({"web": ["m1", "m2", "m3"]}))
        .unwrap();

    let mut boot = Bootstrap::new(config, users());
    for name in ["m1", "m2", "m3"] {
        boot.middleware().register_instance(name, recorder(name, &log));
    }

    let mut router = Router::new();
    router.get("page", logging_handler(&log));
    let kernel = boot.kernel(router).unwrap();

    let response = kernel.handle(HttpRequest::new("GET", "/page")).await;
    assert_eq!(response.status, 200);
    assert_eq!(
        *log.lock(),
        ["m1.before", "m2.before", "m3.before", "handler", "m3.after", "m2.after", "m1.after"]
    );
}

#[tokio::test]
async fn test_short_circuit_skips_inner_middleware_and_handler() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let config = base_config();
    config.set("middleware.GLOBAL", json!(["m1", "m2", "m3"])).unwrap();
    config
        .set("middleware.MIDDLEWARE_GROUPS", json!({"web": ["m1", "m2", "m3"]}))
        .unwrap();

    let mut boot = Bootstrap::new(config, users());
    boot.middleware()
        .register_instance("m1", recorder("m1", &log))
        .register_instance("m2", blocker("m2", &log))
        .register_instance("m3", recorder("m3", &log));

    let mut router = Router::new();
    router.get("page", logging_handler(&log));
    let kernel = boot.kernel(router).unwrap();

    let response = kernel.handle(json_request("GET", "/page")).await;
    assert_eq!(response.status, 403);
    assert_eq!(*log.lock(), ["m1.before", "m2.before", "m2.after", "m1.after"]);
}

#[tokio::test]
async fn test_blueprint_gating_skips_both_phases() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let config = base_config();
    config.set("middleware.GLOBAL", json!(["web_only"])).unwrap();
    config
        .set("middleware.MIDDLEWARE_GROUPS", json!({"web": ["web_only"], "static": []}))
        .unwrap();

    let mut boot = Bootstrap::new(config, users());
    boot.middleware().register_instance("web_only", recorder("web_only", &log));

    let mut router = Router::new();
    router.get("home", logging_handler(&log));
    router.group(RouteGroup::new().prefix("assets").blueprint("static"), |r| {
        r.get("app.css", logging_handler(&log));
    });
    let kernel = boot.kernel(router).unwrap();

    kernel.handle(HttpRequest::new("GET", "/assets/app.css")).await;
    assert_eq!(*log.lock(), ["handler"]);

    log.lock().clear();
    kernel.handle(HttpRequest::new("GET", "/home")).await;
    assert_eq!(*log.lock(), ["web_only.before", "handler", "web_only.after"]);
}

#[tokio::test]
async fn test_route_middleware_wraps_handler() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = RouteMiddlewareRegistry::new();
    registry.register("auth", recorder("auth", &log));
    registry.register("verified", recorder("verified", &log));

    let wrapped = registry.wrap_handler(
        logging_handler(&log),
        &["auth".to_string(), "verified".to_string()],
    );
    wrapped(RequestContext::new(HttpRequest::new("GET", "/"))).await.unwrap();

    assert_eq!(
        *log.lock(),
        ["auth.before", "verified.before", "handler", "verified.after", "auth.after"]
    );
}

#[tokio::test]
async fn test_route_middleware_through_kernel() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut boot = Bootstrap::new(base_config(), users());
    boot.middleware()
        .register_instance("outer", recorder("outer", &log))
        .register_instance("inner", recorder("inner", &log));

    let mut router = Router::new();
    router.get("reports", logging_handler(&log)).middleware(["outer", "inner"]);
    let kernel = boot.kernel(router).unwrap();

    let response = kernel.handle(HttpRequest::new("GET", "/reports")).await;
    assert_eq!(response.status, 200);
    assert_eq!(
        *log.lock(),
        ["outer.before", "inner.before", "handler", "inner.after", "outer.after"]
    );
}

#[tokio::test]
async fn test_unknown_route_middleware_fails_boot() {
    let mut router = Router::new();
    router.get("reports", handler(|_| async { Ok("ok") })).middleware(["missing"]);

    let result = Bootstrap::new(base_config(), users()).kernel(router);
    assert!(matches!(result, Err(Error::MiddlewareNotFound(name)) if name == "missing"));
}

fn csrf_config() -> ConfigManager {
    let config = base_config();
    config.set("security.CSRF_ENABLED", true).unwrap();
    config.set("security.CSRF_SECRET", CSRF_SECRET).unwrap();
    config.set("middleware.GLOBAL", json!(["session", "csrf"])).unwrap();
    config
        .set("middleware.MIDDLEWARE_GROUPS", json!({"api": ["session", "csrf"]}))
        .unwrap();
    config
}

fn posts_router() -> Router {
    let mut router = Router::new();
    router.group(RouteGroup::new().prefix("api").blueprint("api"), |r| {
        r.post("posts", handler(|_| async { Ok(ResponseHelper::created(json!({"id": 7}))) }));
    });
    router
}

#[tokio::test]
async fn test_csrf_rejection_still_rotates_cookie() {
    let kernel = Bootstrap::new(csrf_config(), users()).kernel(posts_router()).unwrap();

    let rejected = kernel.handle(json_request("POST", "/api/posts")).await;
    assert_eq!(rejected.status, 403);
    assert_eq!(rejected.json_body().unwrap()["code"], "FORBIDDEN");
    let cookie = rejected.cookie("csrf_token").expect("rotated csrf cookie").value.clone();
    assert!(!cookie.is_empty());

    let token = token_for_cookie(&cookie, CSRF_SECRET.as_bytes());
    let retried = kernel
        .handle(
            json_request("POST", "/api/posts")
                .with_header("Cookie", format!("csrf_token={cookie}"))
                .with_header("X-CSRF-Token", token),
        )
        .await;
    assert_eq!(retried.status, 201);

    let next = retried.cookie("csrf_token").expect("cookie rotated again").value.clone();
    assert_ne!(next, cookie);
}

#[tokio::test]
async fn test_flash_survives_exactly_one_request() {
    let config = base_config();
    config.set("middleware.GLOBAL", json!(["session"])).unwrap();
    config.set("middleware.MIDDLEWARE_GROUPS", json!({"web": ["session"]})).unwrap();

    let mut router = Router::new();
    router.post(
        "flash",
        handler(|ctx: RequestContext| async move {
            let session = ctx.session().ok_or_else(|| Error::Internal("no session".into()))?;
            session.flash("msg", "hi");
            Ok("flashed")
        }),
    );
    router.get(
        "read",
        handler(|ctx: RequestContext| async move {
            let session = ctx.session().ok_or_else(|| Error::Internal("no session".into()))?;
            Ok(json!({"msg": session.get("msg").unwrap_or(Value::Null)}))
        }),
    );
    let kernel = Bootstrap::new(config, users()).kernel(router).unwrap();

    let first = kernel.handle(HttpRequest::new("POST", "/flash")).await;
    let id = session_cookie(&first);
    let with_session = |method: &str, path: &str| {
        HttpRequest::new(method, path).with_header("Cookie", format!("framework_session={id}"))
    };

    let second = kernel.handle(with_session("GET", "/read")).await;
    assert_eq!(second.json_body().unwrap(), json!({"msg": "hi"}));

    let third = kernel.handle(with_session("GET", "/read")).await;
    assert_eq!(third.json_body().unwrap(), json!({"msg": null}));
}

/// Queues `X-A: queued` for every request.
struct QueueHeader;

#[async_trait]
impl Middleware for QueueHeader {
    async fn before(&self, ctx: &RequestContext) -> Result<Option<Reply>> {
        ctx.queue_header("X-A", "queued");
        ctx.queue_header("X-B", "queued");
        Ok(None)
    }
}

#[tokio::test]
async fn test_explicit_header_beats_queued_header() {
    let config = base_config();
    config.set("middleware.GLOBAL", json!(["queue_header"])).unwrap();
    config
        .set("middleware.MIDDLEWARE_GROUPS", json!({"web": ["queue_header"]}))
        .unwrap();

    let mut boot = Bootstrap::new(config, users());
    boot.middleware().register_instance("queue_header", Arc::new(QueueHeader));

    let mut router = Router::new();
    router.get(
        "headers",
        handler(|_| async { Ok(ResponseBuilder::new("body").header("x-a", "explicit")) }),
    );
    let kernel = boot.kernel(router).unwrap();

    let response = kernel.handle(HttpRequest::new("GET", "/headers")).await;
    assert_eq!(response.header("X-A"), Some("explicit"));
    assert_eq!(response.header("X-B"), Some("queued"));
}

fn users_router(literal_first: bool) -> Router {
    let show = || handler(|ctx: RequestContext| async move { Ok(json!({"route": "show", "id": ctx.param("id")})) });
    let create = || handler(|_| async { Ok(json!({"route": "create"})) });

    let mut router = Router::new();
    if literal_first {
        router.get("users/create", create());
        router.get("users/{id}", show()).where_number("id");
    } else {
        router.get("users/{id}", show()).where_number("id");
        router.get("users/create", create());
    }
    router
}

#[tokio::test]
async fn test_literal_route_wins_regardless_of_order() {
    for literal_first in [true, false] {
        let kernel = Bootstrap::new(base_config(), users())
            .kernel(users_router(literal_first))
            .unwrap();

        let create = kernel.handle(HttpRequest::new("GET", "/users/create")).await;
        assert_eq!(create.json_body().unwrap(), json!({"route": "create"}));

        let show = kernel.handle(HttpRequest::new("GET", "/users/42")).await;
        assert_eq!(show.json_body().unwrap(), json!({"route": "show", "id": "42"}));

        let miss = kernel.handle(HttpRequest::new("GET", "/users/abc")).await;
        assert_eq!(miss.status, 404);
    }
}

fn auth_router() -> Router {
    let mut router = Router::new();
    router.group(RouteGroup::new().prefix("api").blueprint("api"), |r| {
        r.post("posts", handler(|_| async { Ok(ResponseHelper::created(json!({"id": 7}))) }));
        r.group(RouteGroup::new().prefix("auth"), |r| {
            r.post(
                "login",
                handler(|ctx: RequestContext| async move {
                    let session = ctx.session().ok_or_else(|| Error::Internal("no session".into()))?;
                    session.put("user_id", "1");
                    Ok(ResponseHelper::success(Value::Null, Some("Logged in"), None))
                }),
            );
            r.get(
                "me",
                handler(|ctx: RequestContext| async move {
                    Ok(ResponseHelper::success(ctx.user().unwrap_or(Value::Null), None, None))
                }),
            )
            .middleware(["auth"]);
        });
    });
    router
}

#[tokio::test]
async fn test_auth_rejection_stops_csrf() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let config = base_config();
    config.set("security.CSRF_ENABLED", true).unwrap();
    config.set("security.CSRF_SECRET", CSRF_SECRET).unwrap();
    config.set("middleware.GLOBAL", json!(["observer", "auth", "csrf"])).unwrap();
    config
        .set("middleware.MIDDLEWARE_GROUPS", json!({"api": ["observer", "auth", "csrf"]}))
        .unwrap();

    let mut boot = Bootstrap::new(config, users());
    boot.middleware().register_instance("observer", recorder("observer", &log));
    let kernel = boot.kernel(auth_router()).unwrap();

    let response = kernel.handle(json_request("POST", "/api/posts")).await;

    assert_eq!(response.status, 401);
    let body = response.json_body().unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Authentication required");
    assert_eq!(body["code"], "UNAUTHORIZED");

    // csrf never ran: no token was issued for the next request
    assert!(response.cookie("csrf_token").is_none());
    // auth ran its before-phase, so the after-phase reached the outer observer
    assert_eq!(*log.lock(), ["observer.before", "observer.after"]);
}

#[tokio::test]
async fn test_authenticated_get_needs_no_csrf_cookie() {
    let config = csrf_config();
    let kernel = Bootstrap::new(config, users()).kernel(auth_router()).unwrap();

    // login is under the csrf-exempt auth prefix
    let login = kernel.handle(json_request("POST", "/api/auth/login")).await;
    assert_eq!(login.status, 200);
    let id = session_cookie(&login);

    let me = kernel
        .handle(json_request("GET", "/api/auth/me").with_header("Cookie", format!("framework_session={id}")))
        .await;
    assert_eq!(me.status, 200);
    let body = me.json_body().unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert!(body["data"].get("password_hash").is_none());

    let anonymous = kernel.handle(json_request("GET", "/api/auth/me")).await;
    assert_eq!(anonymous.status, 401);
}

#[tokio::test]
async fn test_guest_redirects_authenticated_browser() {
    let config = base_config();
    config.set("middleware.GLOBAL", json!(["session"])).unwrap();
    config.set("middleware.MIDDLEWARE_GROUPS", json!({"web": ["session"]})).unwrap();
    config.set("auth.HOME_URL", "/home").unwrap();

    let mut router = Router::new();
    router.post(
        "login",
        handler(|ctx: RequestContext| async move {
            let session = ctx.session().ok_or_else(|| Error::Internal("no session".into()))?;
            session.put("user_id", 1);
            Ok("welcome")
        }),
    );
    router.get("register", handler(|_| async { Ok("<form></form>") })).middleware(["guest"]);
    let kernel = Bootstrap::new(config, users()).kernel(router).unwrap();

    let guest = kernel.handle(HttpRequest::new("GET", "/register")).await;
    assert_eq!(guest.status, 200);

    let login = kernel.handle(HttpRequest::new("POST", "/login")).await;
    let id = session_cookie(&login);
    let redirected = kernel
        .handle(HttpRequest::new("GET", "/register").with_header("Cookie", format!("framework_session={id}")))
        .await;
    assert_eq!(redirected.status, 302);
    assert_eq!(redirected.header("Location"), Some("/home"));
}
