//! # image-gate
//!
//! Image-serving middleware for axum: resize and re-encode images on the fly,
//! cache the results on disk, and answer with HTTP caching headers.
//!
//! ## Features
//!
//! - **Path-prefix routing**: Requests under a base URL (default `/images`) are
//!   served as images, everything else passes through untouched
//! - **Manipulations**: Width, height, fit/crop, rotation, flip, blur, quality
//!   and output format from short query parameters (`w`, `h`, `fit`, ...)
//! - **Variant cache**: Each distinct variant is generated once and stored on disk
//! - **Conditional requests**: `Last-Modified`/`If-Modified-Since` with `304` replies
//! - **Signed URLs**: Optional HMAC-SHA256 signatures so clients cannot request
//!   arbitrary sizes
//! - **Pluggable errors**: A custom exception handler decides how failures are answered
//!
//! ## Architecture
//!
//! - [`server`] - Middleware, signatures, cache headers and router
//! - [`imaging`] - Image service, transformer and response factory
//! - [`storage`] - Local filesystem storage for sources and variants
//! - [`time`] - Cache time expressions and HTTP dates
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use axum::{middleware, routing::get, Router};
//! use image_gate::{image_middleware, ImageMiddleware, MiddlewareOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let images = ImageMiddleware::new(
//!         MiddlewareOptions::new("/var/www/images")
//!             .with_cache_time(Some("+1 week"))
//!             .with_sign_key(Some("my-secret-key")),
//!     )?;
//!
//!     // Hand signed URLs to templates
//!     let avatar = images.url_builder().url("avatars/me.png", &[("w", "64")]);
//!     println!("{}", avatar);
//!
//!     let app = Router::new()
//!         .route("/", get(|| async { "hello" }))
//!         .layer(middleware::from_fn_with_state(images, image_middleware));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod imaging;
pub mod server;
pub mod storage;
pub mod time;

// Re-export commonly used types
pub use config::{Cli, Command, ServeConfig, SignConfig, SignOutputFormat};
pub use error::{ConfigError, ImageError, SignatureError, StorageError};
pub use imaging::{
    ImageResponseFactory, ImageService, ImageServiceOptions, ImageTransformer, LocalImageService,
    Manipulations, QueryParams, ResponseFactory,
};
pub use server::{
    create_router, image_middleware, ErrorResponse, ExceptionHandler, HealthResponse,
    ImageMiddleware, MiddlewareOptions, ResolvedOptions, RouterConfig, Signature, UrlBuilder,
};
pub use storage::LocalStorage;
pub use time::CacheTime;
