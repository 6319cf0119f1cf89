//! The image middleware.
//!
//! # Request Flow
//!
//! ```text
//! request ──► path starts with base_url? ──no──► next(request)
//!                     │
//!                    yes
//!                     ▼
//!             signature check (if a sign key is set)
//!                     ▼
//!             conditional check ──match──► 304 + cache headers
//!                     ▼
//!             image service ──► 200 + cache headers
//!
//! any error after the match ──► on_exception(error, request head)
//! ```

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::error::{ConfigError, ImageError};
use crate::imaging::{parse_query, ImageService, LocalImageService};
use crate::storage::LocalStorage;

use super::options::{MiddlewareOptions, ResolvedOptions};
use super::responder::respond;
use super::signature::UrlBuilder;

/// Intercepts image requests under a base URL.
///
/// Cheap to clone; all clones share the same configuration and image service.
///
/// # Example
///
/// ```ignore
/// use axum::{middleware, Router};
/// use image_gate::server::{image_middleware, ImageMiddleware, MiddlewareOptions};
///
/// let images = ImageMiddleware::new(MiddlewareOptions::new("/var/www/images"))?;
/// let app = Router::new()
///     .layer(middleware::from_fn_with_state(images.clone(), image_middleware));
///
/// let thumbnail_url = images.url_builder().url("cat.png", &[("w", "200")]);
/// ```
#[derive(Clone)]
pub struct ImageMiddleware {
    inner: Arc<Inner>,
}

struct Inner {
    options: ResolvedOptions,
    service: Arc<dyn ImageService>,
    url_builder: UrlBuilder,
}

impl ImageMiddleware {
    /// Resolve `options` and build the default filesystem image service.
    pub fn new(options: MiddlewareOptions) -> Result<Self, ConfigError> {
        let options = options.resolve()?;
        let service = LocalImageService::new(
            LocalStorage::new(&options.source),
            LocalStorage::new(&options.cache),
            &options.base_url,
            options.image.clone(),
        );
        Ok(Self::from_resolved(options, Arc::new(service)))
    }

    /// Resolve `options` and serve images through a custom service.
    pub fn with_service(
        options: MiddlewareOptions,
        service: Arc<dyn ImageService>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::from_resolved(options.resolve()?, service))
    }

    fn from_resolved(options: ResolvedOptions, service: Arc<dyn ImageService>) -> Self {
        let url_builder = UrlBuilder::new(&options.base_url, options.signature.clone());
        Self {
            inner: Arc::new(Inner {
                options,
                service,
                url_builder,
            }),
        }
    }

    /// URL builder sharing this middleware's base URL and sign key.
    pub fn url_builder(&self) -> &UrlBuilder {
        &self.inner.url_builder
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.inner.options
    }

    /// Decoded, slash-normalized request path if it falls under the base URL.
    pub fn matched_path(&self, raw_path: &str) -> Option<String> {
        let decoded = urlencoding::decode(raw_path)
            .map(|path| path.into_owned())
            .unwrap_or_else(|_| raw_path.to_string());
        let normalized = format!("/{}", decoded.trim_start_matches('/'));

        normalized
            .starts_with(self.inner.options.base_url.as_str())
            .then_some(normalized)
    }

    /// Handle a request, delegating unmatched ones to `next`.
    ///
    /// Errors raised for matched requests go through the exception handler
    /// exactly once; its result is returned unmodified.
    pub async fn handle<F, Fut>(&self, request: Request, next: F) -> Result<Response, ImageError>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = Response>,
    {
        let Some(path) = self.matched_path(request.uri().path()) else {
            debug!(path = %request.uri().path(), "Passing request through");
            return Ok(next(request).await);
        };

        let (parts, _body) = request.into_parts();
        match self.serve(&parts, &path).await {
            Ok(response) => Ok(response),
            Err(error) => {
                debug!(path = %path, error = %error, "Image request failed");
                self.inner.options.on_exception.handle(error, &parts)
            }
        }
    }

    async fn serve(&self, parts: &Parts, path: &str) -> Result<Response, ImageError> {
        let query = parts.uri.query().unwrap_or("");

        if let Some(signature) = &self.inner.options.signature {
            signature.validate_query(path, query)?;
        }

        let params = parse_query(query);
        respond(
            self.inner.service.as_ref(),
            parts,
            path,
            &params,
            self.inner.options.cache_time.as_ref(),
        )
        .await
    }
}

/// Axum adapter for [`ImageMiddleware`], for use with
/// [`axum::middleware::from_fn_with_state`].
pub async fn image_middleware(
    State(middleware): State<ImageMiddleware>,
    request: Request,
    next: Next,
) -> Result<Response, ImageError> {
    middleware
        .handle(request, |request| next.run(request))
        .await
}
