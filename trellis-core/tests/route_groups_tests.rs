use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use trellis_core::*;

struct Tag {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Middleware for Tag {
    async fn before(&self, _ctx: &RequestContext) -> Result<Option<Reply>> {
        self.log.lock().push(self.name.to_string());
        Ok(None)
    }
}

fn ok() -> HandlerFn {
    handler(|_| async { Ok(HttpResponse::ok()) })
}

#[tokio::test]
async fn test_group_middleware_runs_outermost_first() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut registry = RouteMiddlewareRegistry::new();
    for name in ["throttle", "auth", "verified"] {
        registry.register(name, Arc::new(Tag { name, log: log.clone() }));
    }

    let mut router = Router::new();
    router.group(RouteGroup::new().prefix("admin").middleware(["throttle"]), |r| {
        r.group(RouteGroup::new().middleware(["auth"]), |r| {
            r.get("reports", ok()).middleware(["verified"]);
        });
    });

    let kernel = HttpKernel::new(router.build().unwrap(), MiddlewarePipeline::new(), registry).unwrap();
    let response = kernel.handle(HttpRequest::new("GET", "/admin/reports")).await;

    assert_eq!(response.status, 200);
    assert_eq!(*log.lock(), ["throttle", "auth", "verified"]);
}

#[test]
fn test_group_name_prefixes_accumulate() {
    let mut router = Router::new();
    router.group(RouteGroup::new().prefix("api").blueprint("api"), |r| {
        r.group(RouteGroup::new().prefix("auth"), |r| {
            r.post("login", ok()).name("login");
            r.get("me", ok()).name("api.auth.me");
        });
    });
    let routes = router.build().unwrap();

    assert!(routes.has_named_route("api.auth.login"));
    assert!(routes.has_named_route("api.auth.me"));
    let me = routes.get_by_name("api.auth.me").unwrap();
    assert_eq!(me.uri(), "api/auth/me");
    assert_eq!(me.prefix_without_blueprint().as_deref(), Some("auth"));
}

#[test]
fn test_group_domain_and_constraints() {
    let mut router = Router::new();
    router.group(
        RouteGroup::new().domain("admin.example.com").where_("id", "[0-9]+"),
        |r| {
            r.get("users/{id}", ok());
        },
    );
    let routes = router.build().unwrap();

    let route = &routes.routes()[0];
    assert_eq!(route.get_domain(), Some("admin.example.com"));
    let host = Some("admin.example.com");
    assert!(routes.match_request("/users/abc", "GET", host).is_none());
    assert!(routes.match_request("/users/12", "GET", host).is_some());
    assert!(routes.match_request("/users/12", "GET", Some("example.com")).is_none());
}

#[tokio::test]
async fn test_domain_group_served_by_host() {
    let mut router = Router::new();
    router.group(RouteGroup::new().domain("admin.example.com"), |r| {
        r.get("/", handler(|_| async { Ok("admin") }));
    });
    router.get("/", handler(|_| async { Ok("public") }));
    let kernel = HttpKernel::new(
        router.build().unwrap(),
        MiddlewarePipeline::new(),
        RouteMiddlewareRegistry::new(),
    )
    .unwrap();

    let admin = kernel
        .handle(HttpRequest::new("GET", "/").with_header("Host", "admin.example.com"))
        .await;
    assert_eq!(admin.body_text(), "admin");

    let public = kernel
        .handle(HttpRequest::new("GET", "/").with_header("Host", "www.example.com"))
        .await;
    assert_eq!(public.body_text(), "public");
}

#[tokio::test]
async fn test_blueprint_reaches_context() {
    let mut router = Router::new();
    router.group(RouteGroup::new().blueprint("static"), |r| {
        r.get("assets/{file}", handler(|ctx: RequestContext| async move {
            Ok(ctx.blueprint().unwrap_or_default())
        }))
        .where_("file", ".*");
    });
    let kernel = HttpKernel::new(
        router.build().unwrap(),
        MiddlewarePipeline::new(),
        RouteMiddlewareRegistry::new(),
    )
    .unwrap();

    let response = kernel.handle(HttpRequest::new("GET", "/assets/app.js")).await;
    assert_eq!(response.body_text(), "static");
}
