//! Middleware configuration.
//!
//! [`MiddlewareOptions`] is a builder. It is resolved exactly once, when the
//! middleware is constructed, into an immutable [`ResolvedOptions`].
//!
//! # Example
//!
//! ```ignore
//! use image_gate::server::{ExceptionHandler, ImageMiddleware, MiddlewareOptions};
//!
//! let options = MiddlewareOptions::new("/var/www/images")
//!     .with_base_url("/img")
//!     .with_cache("/var/cache/img")
//!     .with_cache_time(Some("+1 week"))
//!     .with_sign_key(Some("my-secret-key"))
//!     .with_exception_handler(ExceptionHandler::render());
//!
//! let middleware = ImageMiddleware::new(options)?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    http::request::Parts,
    response::{IntoResponse, Response},
};

use crate::error::{ConfigError, ImageError};
use crate::imaging::ImageServiceOptions;
use crate::time::{is_disabled_expression, CacheTime, DEFAULT_CACHE_TIME};

use super::signature::Signature;

/// Default URL prefix handled by the middleware.
pub const DEFAULT_BASE_URL: &str = "/images";

/// Name of the default cache directory inside the system temp directory.
pub const DEFAULT_CACHE_DIR_NAME: &str = "image-gate";

// =============================================================================
// Exception Handler
// =============================================================================

type ExceptionFn = dyn Fn(ImageError, &Parts) -> Result<Response, ImageError> + Send + Sync;

/// Translates errors raised for matched requests into responses.
///
/// Returning `Ok(response)` delivers that response unmodified. Returning
/// `Err(error)` lets the error propagate to the framework.
#[derive(Clone)]
pub struct ExceptionHandler(Arc<ExceptionFn>);

impl ExceptionHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(ImageError, &Parts) -> Result<Response, ImageError> + Send + Sync + 'static,
    {
        Self(Arc::new(handler))
    }

    /// Re-raise every error (the default).
    pub fn propagate() -> Self {
        Self::new(|error, _| Err(error))
    }

    /// Render every error as its JSON error response.
    pub fn render() -> Self {
        Self::new(|error, _| Ok(error.into_response()))
    }

    pub fn handle(&self, error: ImageError, parts: &Parts) -> Result<Response, ImageError> {
        (self.0)(error, parts)
    }
}

impl Default for ExceptionHandler {
    fn default() -> Self {
        Self::propagate()
    }
}

impl std::fmt::Debug for ExceptionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExceptionHandler")
    }
}

// =============================================================================
// Options Builder
// =============================================================================

/// Builder for the middleware configuration.
#[derive(Debug, Clone)]
pub struct MiddlewareOptions {
    source: Option<PathBuf>,
    base_url: String,
    cache: Option<PathBuf>,
    cache_time: Option<String>,
    sign_key: Option<String>,
    image: ImageServiceOptions,
    on_exception: ExceptionHandler,
}

impl Default for MiddlewareOptions {
    /// Defaults without a source directory. Resolving them fails with
    /// [`ConfigError::MissingSource`].
    fn default() -> Self {
        Self {
            source: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            cache: None,
            cache_time: Some(DEFAULT_CACHE_TIME.to_string()),
            sign_key: None,
            image: ImageServiceOptions::default(),
            on_exception: ExceptionHandler::default(),
        }
    }
}

impl MiddlewareOptions {
    /// Options serving images from `source`.
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::default()
        }
    }

    /// URL path prefix to intercept (default `/images`).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Directory for generated variants (default `<temp dir>/image-gate`).
    pub fn with_cache(mut self, cache: impl Into<PathBuf>) -> Self {
        self.cache = Some(cache.into());
        self
    }

    /// Relative expiry such as `+1 day`. `None` or a falsy value disables
    /// conditional caching and cache headers.
    pub fn with_cache_time(mut self, cache_time: Option<&str>) -> Self {
        self.cache_time = cache_time.map(str::to_string);
        self
    }

    /// Secret for signed URLs. `None` or an empty key disables signing.
    pub fn with_sign_key(mut self, sign_key: Option<&str>) -> Self {
        self.sign_key = sign_key.map(str::to_string);
        self
    }

    /// Options forwarded to the image service.
    pub fn with_image_options(mut self, image: ImageServiceOptions) -> Self {
        self.image = image;
        self
    }

    pub fn with_exception_handler(mut self, handler: ExceptionHandler) -> Self {
        self.on_exception = handler;
        self
    }

    /// Validate and resolve the options.
    pub fn resolve(self) -> Result<ResolvedOptions, ConfigError> {
        let source = self
            .source
            .filter(|source| !source.as_os_str().is_empty())
            .ok_or(ConfigError::MissingSource)?;

        let base_url = normalize_base_url(&self.base_url)?;

        let cache = self
            .cache
            .filter(|cache| !cache.as_os_str().is_empty())
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_CACHE_DIR_NAME));

        let cache_time = match self.cache_time.as_deref() {
            Some(expression) if !is_disabled_expression(expression) => {
                Some(CacheTime::parse(expression)?)
            }
            _ => None,
        };

        let signature = self
            .sign_key
            .filter(|key| !key.is_empty())
            .map(Signature::new);

        Ok(ResolvedOptions {
            source,
            cache,
            base_url,
            cache_time,
            signature,
            image: self.image,
            on_exception: self.on_exception,
        })
    }
}

/// Normalize a base URL to a path with exactly one leading slash and no
/// trailing slash (`/` for the root).
fn normalize_base_url(base_url: &str) -> Result<String, ConfigError> {
    if base_url.contains("://") || base_url.contains(&['?', '#'][..]) {
        return Err(ConfigError::InvalidBaseUrl(base_url.to_string()));
    }
    Ok(format!("/{}", base_url.trim_matches('/')))
}

// =============================================================================
// Resolved Options
// =============================================================================

/// Immutable configuration of a constructed middleware.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    /// Root directory of source images
    pub source: PathBuf,

    /// Root directory of generated variants
    pub cache: PathBuf,

    /// Normalized URL prefix, e.g. `/images` (or `/` to match everything)
    pub base_url: String,

    /// Expiry for cache headers (None = conditional caching disabled)
    pub cache_time: Option<CacheTime>,

    /// Signature verifier (None = signing disabled)
    pub signature: Option<Signature>,

    /// Options forwarded to the image service
    pub image: ImageServiceOptions,

    pub on_exception: ExceptionHandler,
}
