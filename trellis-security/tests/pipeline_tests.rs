//! CORS and security headers running inside the kernel pipeline.

use serde_json::json;
use std::sync::Arc;
use trellis_config::ConfigManager;
use trellis_core::*;
use trellis_security::{CorsConfig, CorsMiddleware, SecurityHeadersMiddleware};

fn kernel(cors: CorsConfig) -> HttpKernel {
    let mut router = Router::new();
    router.group(RouteGroup::new().prefix("api").blueprint("api"), |r| {
        r.get("users", handler(|_| async { Ok(json!([{ "id": 1 }])) }));
        r.post("users", handler(|_| async { Ok(ResponseHelper::created(json!({ "id": 2 }))) }));
    });

    let mut pipeline = MiddlewarePipeline::new();
    pipeline.add("cors", Arc::new(CorsMiddleware::new(cors).unwrap()));
    pipeline.add("security_headers", Arc::new(SecurityHeadersMiddleware::default()));
    pipeline.group("api", ["cors", "security_headers"]);

    HttpKernel::new(router.build().unwrap(), pipeline, RouteMiddlewareRegistry::new()).unwrap()
}

#[tokio::test]
async fn test_actual_request_gets_cors_and_security_headers() {
    let kernel = kernel(CorsConfig::new().allow_origin("https://app.example.com").unwrap());
    let request = HttpRequest::new("GET", "/api/users").with_header("Origin", "https://app.example.com");

    let response = kernel.handle(request).await;

    assert_eq!(response.status, 200);
    assert_eq!(
        response.header("Access-Control-Allow-Origin"),
        Some("https://app.example.com")
    );
    assert_eq!(response.header("Vary"), Some("Origin"));
    assert_eq!(response.header("X-Frame-Options"), Some("DENY"));
    assert_eq!(response.header("X-Content-Type-Options"), Some("nosniff"));
    assert!(response.header("Content-Security-Policy").is_some());
}

#[tokio::test]
async fn test_preflight_never_reaches_router() {
    let kernel = kernel(CorsConfig::new().allow_origin("https://*.example.com").unwrap());
    let request = HttpRequest::new("OPTIONS", "/api/users")
        .with_header("Origin", "https://admin.example.com")
        .with_header("Access-Control-Request-Method", "POST");

    let response = kernel.handle(request).await;

    assert_eq!(response.status, 204);
    assert!(response.body.is_empty());
    assert_eq!(
        response.header("Access-Control-Allow-Origin"),
        Some("https://admin.example.com")
    );
    assert!(response.header("Access-Control-Allow-Methods").unwrap().contains("POST"));
    // security_headers never ran its before-phase, so its after-phase is skipped.
    assert!(response.header("X-Frame-Options").is_none());
}

#[tokio::test]
async fn test_unlisted_origin_gets_no_cors_headers() {
    let kernel = kernel(CorsConfig::new().allow_origin("https://app.example.com").unwrap());
    let request = HttpRequest::new("GET", "/api/users").with_header("Origin", "https://evil.test");

    let response = kernel.handle(request).await;

    assert_eq!(response.status, 200);
    assert!(response.header("Access-Control-Allow-Origin").is_none());
    assert_eq!(response.header("X-Frame-Options"), Some("DENY"));
}

#[tokio::test]
async fn test_config_driven_construction() {
    let config = ConfigManager::new();
    config.set("security.ALLOWED_ORIGINS", ["*"]).unwrap();
    config.set("security.CORS_ALLOW_CREDENTIALS", true).unwrap();
    assert!(CorsMiddleware::from_config(&config).is_err());

    config.set("security.CORS_ALLOW_CREDENTIALS", false).unwrap();
    config.set("security.REFERRER_POLICY", "same-origin").unwrap();
    let cors = CorsMiddleware::from_config(&config).unwrap();
    let headers = SecurityHeadersMiddleware::from_config(&config).unwrap();

    let mut pipeline = MiddlewarePipeline::new();
    pipeline.add("cors", Arc::new(cors));
    pipeline.add("security_headers", Arc::new(headers));
    pipeline.group("web", ["cors", "security_headers"]);
    let mut router = Router::new();
    router.get("/", handler(|_| async { Ok("<h1>home</h1>") }));
    let kernel = HttpKernel::new(router.build().unwrap(), pipeline, RouteMiddlewareRegistry::new()).unwrap();

    let response = kernel
        .handle(HttpRequest::new("GET", "/").with_header("Origin", "https://x.test"))
        .await;
    assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));
    assert_eq!(response.header("Referrer-Policy"), Some("same-origin"));
}
