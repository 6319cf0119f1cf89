//! Signed URL tests.
//!
//! Tests verify:
//! - URLs produced by the middleware's URL builder are accepted
//! - Missing, malformed and mismatched signatures are rejected
//! - Rejections render as JSON through the router

use axum::http::StatusCode;
use tower::ServiceExt;

use image_gate::{
    create_router, ErrorResponse, ImageError, ImageMiddleware, RouterConfig, SignatureError,
};

use super::test_utils::{body_bytes, dimensions, get, next_handler, ImageDirs};

const SIGN_KEY: &str = "secret";

fn signed_middleware(dirs: &ImageDirs) -> ImageMiddleware {
    ImageMiddleware::new(dirs.options().with_sign_key(Some(SIGN_KEY))).unwrap()
}

async fn error_body(response: axum::response::Response) -> ErrorResponse {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// =============================================================================
// Middleware
// =============================================================================

#[tokio::test]
async fn test_builder_url_is_accepted() {
    let dirs = ImageDirs::new();
    let middleware = signed_middleware(&dirs);

    let url = middleware.url_builder().url("phpdish.png", &[("w", "50")]);
    assert!(url.starts_with("/images/phpdish.png?w=50&s="));

    let response = middleware.handle(get(&url, &[]), next_handler).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(dimensions(&body_bytes(response).await), (50, 25));
}

#[tokio::test]
async fn test_wrong_signature_is_mismatch() {
    let dirs = ImageDirs::new();
    let middleware = signed_middleware(&dirs);

    let result = middleware
        .handle(get("/images/phpdish.png?w=50&s=45667777", &[]), next_handler)
        .await;
    assert!(matches!(
        result,
        Err(ImageError::Signature(SignatureError::Mismatch))
    ));
    assert_eq!(dirs.cached_files(), 0);
}

#[tokio::test]
async fn test_omitted_signature_is_missing() {
    let dirs = ImageDirs::new();
    let middleware = signed_middleware(&dirs);

    let result = middleware
        .handle(get("/images/phpdish.png?w=50", &[]), next_handler)
        .await;
    assert!(matches!(
        result,
        Err(ImageError::Signature(SignatureError::Missing))
    ));
}

#[tokio::test]
async fn test_tampered_params_are_rejected() {
    let dirs = ImageDirs::new();
    let middleware = signed_middleware(&dirs);

    let url = middleware.url_builder().url("phpdish.png", &[("w", "50")]);
    let tampered = url.replace("w=50", "w=150");

    let result = middleware.handle(get(&tampered, &[]), next_handler).await;
    assert!(matches!(
        result,
        Err(ImageError::Signature(SignatureError::Mismatch))
    ));
}

#[tokio::test]
async fn test_param_order_does_not_matter() {
    let dirs = ImageDirs::new();
    let middleware = signed_middleware(&dirs);

    let url = middleware
        .url_builder()
        .url("phpdish.png", &[("w", "50"), ("h", "20")]);
    let (path, query) = url.split_once('?').unwrap();

    // Reverse the query pairs; the signature covers the sorted params
    let reordered: Vec<&str> = query.split('&').rev().collect();
    let reordered = format!("{}?{}", path, reordered.join("&"));

    let response = middleware
        .handle(get(&reordered, &[]), next_handler)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_signature_does_not_transfer_between_paths() {
    let dirs = ImageDirs::new();
    std::fs::copy(
        dirs.source.path().join("phpdish.png"),
        dirs.source.path().join("other.png"),
    )
    .unwrap();
    let middleware = signed_middleware(&dirs);

    let url = middleware.url_builder().url("phpdish.png", &[("w", "50")]);
    let moved = url.replace("phpdish.png", "other.png");

    let result = middleware.handle(get(&moved, &[]), next_handler).await;
    assert!(matches!(result, Err(ImageError::Signature(_))));
}

// =============================================================================
// Router
// =============================================================================

#[tokio::test]
async fn test_router_renders_unauthorized_json() {
    let dirs = ImageDirs::new();
    let router = create_router(signed_middleware(&dirs), RouterConfig::new().with_tracing(false));

    let response = router
        .oneshot(get("/images/phpdish.png?w=50&s=45667777", &[]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let error = error_body(response).await;
    assert_eq!(error.error, "invalid_signature");
    assert_eq!(error.status, Some(401));
}

#[tokio::test]
async fn test_router_renders_missing_signature() {
    let dirs = ImageDirs::new();
    let router = create_router(signed_middleware(&dirs), RouterConfig::new().with_tracing(false));

    let response = router
        .oneshot(get("/images/phpdish.png", &[]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_body(response).await.error, "missing_signature");
}

#[tokio::test]
async fn test_router_renders_malformed_signature() {
    let dirs = ImageDirs::new();
    let middleware = signed_middleware(&dirs);

    let router = create_router(middleware.clone(), RouterConfig::new().with_tracing(false));
    let response = router
        .oneshot(get("/images/phpdish.png?w=50&s=not-hex", &[]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(response).await.error, "invalid_signature_format");

    // A valid signature repeated twice is still malformed
    let url = middleware.url_builder().url("phpdish.png", &[("w", "50")]);
    let signature = url.rsplit_once("s=").unwrap().1.to_string();
    let duplicated = format!("{}&s={}", url, signature);

    let router = create_router(middleware, RouterConfig::new().with_tracing(false));
    let response = router.oneshot(get(&duplicated, &[])).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
