//! Integration tests for trellis-csrf

use serde_json::json;
use std::sync::Arc;
use trellis_config::ConfigManager;
use trellis_core::*;
use trellis_csrf::*;

const SECRET: &str = "integration-secret";

#[test]
fn test_config_from_manager() {
    let config = ConfigManager::new();
    assert!(!CsrfConfig::enabled(&config));

    config.set("security.CSRF_ENABLED", "true").unwrap();
    config.set("security.CSRF_SECRET", SECRET).unwrap();
    config.set("security.CSRF_HEADER_NAME", "X-XSRF-Token").unwrap();
    config.set("security.CSRF_COOKIE_NAME", "xsrf").unwrap();

    let csrf = CsrfConfig::from_config(&config).unwrap();
    assert!(CsrfConfig::enabled(&config));
    assert_eq!(csrf.secret, SECRET.as_bytes());
    assert_eq!(csrf.header_name, "X-XSRF-Token");
    assert_eq!(csrf.cookie_name, "xsrf");
}

#[test]
fn test_missing_secret_is_generated() {
    let a = CsrfConfig::from_config(&ConfigManager::new()).unwrap();
    let b = CsrfConfig::from_config(&ConfigManager::new()).unwrap();
    assert_eq!(a.secret.len(), 64);
    assert_ne!(a.secret, b.secret);
}

#[test]
fn test_pair_verifies_only_with_its_secret() {
    let pair = CsrfTokenPair::generate(SECRET.as_bytes());
    assert!(verify(&pair.token, &pair.cookie, SECRET.as_bytes()).is_ok());
    assert!(matches!(
        verify(&pair.token, &pair.cookie, b"other-secret"),
        Err(CsrfError::InvalidToken)
    ));

    let other = CsrfTokenPair::generate(SECRET.as_bytes());
    assert!(verify(&pair.token, &other.cookie, SECRET.as_bytes()).is_err());
    assert!(matches!(verify("not-hex", &pair.cookie, SECRET.as_bytes()), Err(CsrfError::InvalidToken)));
}

fn kernel() -> HttpKernel {
    let mut router = Router::new();
    router.group(RouteGroup::new().prefix("api").blueprint("api"), |r| {
        r.post("orders", handler(|_| async { Ok(json!({"created": true})) }));
        r.group(RouteGroup::new().prefix("auth"), |r| {
            r.post("login", handler(|_| async { Ok(json!({"login": true})) }));
        });
    });
    router.post("contact", handler(|_| async { Ok("sent") }));

    let mut pipeline = MiddlewarePipeline::new();
    pipeline.add_unnamed(Arc::new(CsrfMiddleware::new(CsrfConfig::new(SECRET).unwrap())));
    HttpKernel::new(router.build().unwrap(), pipeline, RouteMiddlewareRegistry::new()).unwrap()
}

fn post(path: &str) -> HttpRequest {
    HttpRequest::new("POST", path).with_header("Accept", "application/json")
}

#[tokio::test]
async fn test_header_and_form_tokens_accepted() {
    let kernel = kernel();
    let pair = CsrfTokenPair::generate(SECRET.as_bytes());
    let cookie = format!("csrf_token={}", pair.cookie);

    let via_header = kernel
        .handle(
            post("/api/orders")
                .with_header("Cookie", cookie.clone())
                .with_header("X-CSRF-Token", pair.token.clone()),
        )
        .await;
    assert_eq!(via_header.status, 200);

    let via_form = kernel
        .handle(
            post("/api/orders")
                .with_header("Cookie", cookie)
                .with_header("Content-Type", "application/x-www-form-urlencoded")
                .with_body(format!("_csrf_token={}", pair.token)),
        )
        .await;
    assert_eq!(via_form.status, 200);
}

#[tokio::test]
async fn test_mismatched_token_rejected_with_new_cookie() {
    let kernel = kernel();
    let pair = CsrfTokenPair::generate(SECRET.as_bytes());
    let other = CsrfTokenPair::generate(SECRET.as_bytes());

    let response = kernel
        .handle(
            post("/api/orders")
                .with_header("Cookie", format!("csrf_token={}", pair.cookie))
                .with_header("X-CSRF-Token", other.token),
        )
        .await;

    assert_eq!(response.status, 403);
    assert_eq!(response.json_body().unwrap()["message"], "CSRF token invalid");
    let rotated = response.cookie("csrf_token").unwrap();
    assert_ne!(rotated.value, pair.cookie);
    assert!(!rotated.http_only);
}

#[tokio::test]
async fn test_exempt_routes() {
    let kernel = kernel();

    let login = kernel.handle(post("/api/auth/login")).await;
    assert_eq!(login.status, 200);

    let web = kernel.handle(post("/contact")).await;
    assert_eq!(web.status, 200);

    let get = kernel.handle(HttpRequest::new("GET", "/api/orders")).await;
    assert_ne!(get.status, 403);
    assert!(get.cookie("csrf_token").is_some());
}
