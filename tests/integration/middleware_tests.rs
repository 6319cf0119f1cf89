//! Middleware integration tests.
//!
//! Tests verify:
//! - Requests outside the base URL pass through untouched
//! - Images are transformed, cached and served with the right headers
//! - Errors go through the exception handler exactly once

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::http::header::{CACHE_CONTROL, LAST_MODIFIED};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use image_gate::imaging::DEFAULT_MAX_IMAGE_SIZE;
use image_gate::{ExceptionHandler, ImageError, ImageMiddleware, MiddlewareOptions};

use super::test_utils::{
    body_bytes, dimensions, get, header, next_handler, ImageDirs, FIXTURE_HEIGHT, FIXTURE_WIDTH,
    NEXT_MARKER,
};

// =============================================================================
// Pass-through
// =============================================================================

#[tokio::test]
async fn test_non_matching_path_returns_next_response() {
    let dirs = ImageDirs::new();
    let middleware = ImageMiddleware::new(dirs.options()).unwrap();

    let response = middleware
        .handle(get("/about?w=50", &[]), next_handler)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, NEXT_MARKER), "1");
    assert_eq!(body_bytes(response).await.as_ref(), b"next");
    assert_eq!(dirs.cached_files(), 0);
}

#[tokio::test]
async fn test_non_matching_path_skips_signature_check() {
    let dirs = ImageDirs::new();
    let middleware =
        ImageMiddleware::new(dirs.options().with_sign_key(Some("secret"))).unwrap();

    let response = middleware
        .handle(get("/health", &[]), next_handler)
        .await
        .unwrap();
    assert_eq!(header(&response, NEXT_MARKER), "1");
}

#[tokio::test]
async fn test_custom_base_url() {
    let dirs = ImageDirs::new();
    let middleware = ImageMiddleware::new(dirs.options().with_base_url("img/")).unwrap();

    let response = middleware
        .handle(get("/img/phpdish.png", &[]), next_handler)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(NEXT_MARKER).is_none());

    let response = middleware
        .handle(get("/images/phpdish.png", &[]), next_handler)
        .await
        .unwrap();
    assert_eq!(header(&response, NEXT_MARKER), "1");
}

// =============================================================================
// Image Serving
// =============================================================================

#[tokio::test]
async fn test_serves_original_size_without_params() {
    let dirs = ImageDirs::new();
    let middleware = ImageMiddleware::new(dirs.options()).unwrap();

    let response = middleware
        .handle(get("/images/phpdish.png", &[]), next_handler)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/png");
    let length: usize = header(&response, "content-length").parse().unwrap();

    let body = body_bytes(response).await;
    assert_eq!(body.len(), length);
    assert_eq!(dimensions(&body), (FIXTURE_WIDTH, FIXTURE_HEIGHT));
}

#[tokio::test]
async fn test_resize_and_convert() {
    let dirs = ImageDirs::new();
    let middleware = ImageMiddleware::new(dirs.options()).unwrap();

    let response = middleware
        .handle(get("/images/phpdish.png?w=50&fm=jpg&q=60", &[]), next_handler)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header(&response, "content-type"), "image/jpeg");
    let body = body_bytes(response).await;
    assert_eq!(dimensions(&body), (50, 25));
}

#[tokio::test]
async fn test_crop_to_exact_box() {
    let dirs = ImageDirs::new();
    let middleware = ImageMiddleware::new(dirs.options()).unwrap();

    let response = middleware
        .handle(
            get("/images/phpdish.png?w=40&h=40&fit=crop-left", &[]),
            next_handler,
        )
        .await
        .unwrap();
    let body = body_bytes(response).await;
    assert_eq!(dimensions(&body), (40, 40));
}

#[tokio::test]
async fn test_percent_encoded_path() {
    let dirs = ImageDirs::new();
    std::fs::create_dir(dirs.source.path().join("my photos")).unwrap();
    std::fs::copy(
        dirs.source.path().join("phpdish.png"),
        dirs.source.path().join("my photos/dish.png"),
    )
    .unwrap();
    let middleware = ImageMiddleware::new(dirs.options()).unwrap();

    let response = middleware
        .handle(get("/images/my%20photos/dish.png?w=20", &[]), next_handler)
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_repeated_transform_is_idempotent() {
    let dirs = ImageDirs::new();
    let middleware = ImageMiddleware::new(dirs.options()).unwrap();

    let first = middleware
        .handle(get("/images/phpdish.png?w=50", &[]), next_handler)
        .await
        .unwrap();
    let first_modified = header(&first, "last-modified").to_string();
    let first_body = body_bytes(first).await;
    assert_eq!(dirs.cached_files(), 1);

    let second = middleware
        .handle(get("/images/phpdish.png?w=50", &[]), next_handler)
        .await
        .unwrap();
    assert_eq!(header(&second, "last-modified"), first_modified);
    assert_eq!(body_bytes(second).await, first_body);
    assert_eq!(dirs.cached_files(), 1);

    // A different variant is cached separately
    middleware
        .handle(get("/images/phpdish.png?w=60", &[]), next_handler)
        .await
        .unwrap();
    assert_eq!(dirs.cached_files(), 2);
}

#[tokio::test]
async fn test_oversized_request_is_bounded_by_default_budget() {
    let dirs = ImageDirs::new();
    let middleware = ImageMiddleware::new(dirs.options()).unwrap();

    let response = middleware
        .handle(
            get("/images/phpdish.png?w=4000000&dpr=8&fm=jpg", &[]),
            next_handler,
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let (w, h) = dimensions(&body_bytes(response).await);
    assert!(u64::from(w) * u64::from(h) <= DEFAULT_MAX_IMAGE_SIZE);
    assert_eq!(w / h, 2, "aspect ratio is kept");
}

#[tokio::test]
async fn test_presets_from_image_options() {
    let dirs = ImageDirs::new();
    let image_options = image_gate::ImageServiceOptions::from_json_str(
        r#"{"presets": {"thumb": {"w": "30", "h": "30", "fit": "crop"}}}"#,
    )
    .unwrap();
    let middleware =
        ImageMiddleware::new(dirs.options().with_image_options(image_options)).unwrap();

    let response = middleware
        .handle(get("/images/phpdish.png?p=thumb", &[]), next_handler)
        .await
        .unwrap();
    let body = body_bytes(response).await;
    assert_eq!(dimensions(&body), (30, 30));
}

// =============================================================================
// Exception Handling
// =============================================================================

#[tokio::test]
async fn test_missing_asset_propagates_source_not_found() {
    let dirs = ImageDirs::new();
    let middleware = ImageMiddleware::new(dirs.options()).unwrap();

    let result = middleware
        .handle(get("/images/nonexistent.jpg", &[]), next_handler)
        .await;

    match result {
        Err(ImageError::SourceNotFound { path }) => assert_eq!(path, "nonexistent.jpg"),
        other => panic!("expected SourceNotFound, got {:?}", other.map(|r| r.status())),
    }
}

#[tokio::test]
async fn test_custom_handler_translates_missing_asset() {
    let dirs = ImageDirs::new();
    let handler = ExceptionHandler::new(|error, parts| match error {
        ImageError::SourceNotFound { .. } => Ok((
            StatusCode::NOT_FOUND,
            format!("Image not found: {}", parts.uri.path()),
        )
            .into_response()),
        other => Err(other),
    });
    let middleware = ImageMiddleware::new(dirs.options().with_exception_handler(handler)).unwrap();

    let response = middleware
        .handle(get("/images/nonexistent.jpg", &[]), next_handler)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_bytes(response).await;
    assert_eq!(body.as_ref(), b"Image not found: /images/nonexistent.jpg");
}

#[tokio::test]
async fn test_custom_handler_response_is_delivered_unmodified() {
    let dirs = ImageDirs::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let handler_calls = Arc::clone(&calls);
    let handler = ExceptionHandler::new(move |_, _| {
        handler_calls.fetch_add(1, Ordering::SeqCst);
        Ok((StatusCode::IM_A_TEAPOT, "handled").into_response())
    });
    let middleware = ImageMiddleware::new(
        dirs.options()
            .with_sign_key(Some("secret"))
            .with_exception_handler(handler),
    )
    .unwrap();

    // Unsigned request fails the signature check
    let response = middleware
        .handle(get("/images/phpdish.png?w=50", &[]), next_handler)
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
    assert!(response.headers().get(CACHE_CONTROL).is_none());
    assert!(response.headers().get(LAST_MODIFIED).is_none());
    assert_eq!(body_bytes(response).await.as_ref(), b"handled");
}

#[tokio::test]
async fn test_render_handler_returns_json_error() {
    let dirs = ImageDirs::new();
    let middleware = ImageMiddleware::new(
        dirs.options()
            .with_exception_handler(ExceptionHandler::render()),
    )
    .unwrap();

    let response = middleware
        .handle(get("/images/nonexistent.jpg", &[]), next_handler)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_bytes(response).await;
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "not_found");
}

#[tokio::test]
async fn test_corrupt_source_is_transform_failure() {
    let dirs = ImageDirs::new();
    std::fs::write(dirs.source.path().join("broken.png"), b"not a png").unwrap();
    let middleware = ImageMiddleware::new(dirs.options()).unwrap();

    let result = middleware
        .handle(get("/images/broken.png?w=10", &[]), next_handler)
        .await;
    assert!(matches!(result, Err(ImageError::TransformFailed { .. })));
}

#[tokio::test]
async fn test_path_traversal_is_not_found() {
    let dirs = ImageDirs::new();
    let middleware = ImageMiddleware::new(dirs.options()).unwrap();

    let result = middleware
        .handle(get("/images/..%2F..%2Fetc%2Fpasswd", &[]), next_handler)
        .await;
    assert!(matches!(result, Err(ImageError::SourceNotFound { .. })));
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_missing_source_is_config_error() {
    assert!(matches!(
        ImageMiddleware::new(MiddlewareOptions::default()),
        Err(image_gate::ConfigError::MissingSource)
    ));
}
