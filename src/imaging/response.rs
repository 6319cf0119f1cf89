//! Turning cached variants into HTTP responses.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderValue},
    response::Response,
};
use image::ImageFormat;

use crate::error::{ImageError, StorageError};
use crate::storage::LocalStorage;

/// MIME type used when neither the content nor the extension is recognized.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Builds the HTTP response for a cached image.
///
/// Installed on the image service and invoked once the variant at `path`
/// exists in the cache.
#[async_trait]
pub trait ResponseFactory: Send + Sync {
    async fn create(&self, cache: &LocalStorage, path: &str) -> Result<Response, ImageError>;
}

/// Default factory: full body with `Content-Type` and `Content-Length`.
#[derive(Debug, Clone, Default)]
pub struct ImageResponseFactory;

#[async_trait]
impl ResponseFactory for ImageResponseFactory {
    async fn create(&self, cache: &LocalStorage, path: &str) -> Result<Response, ImageError> {
        let data = cache.read(path).await.map_err(|e| match e {
            StorageError::NotFound(_) | StorageError::InvalidPath(_) => {
                ImageError::CachedImageNotFound {
                    path: path.to_string(),
                }
            }
            StorageError::Io(message) => ImageError::Storage(message),
        })?;

        let mime = detect_mime(&data, path);
        let length = data.len() as u64;

        let mut response = Response::new(Body::from(data));
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(mime));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

        Ok(response)
    }
}

/// Detect the MIME type from magic bytes, then from the file extension.
pub fn detect_mime(data: &[u8], path: &str) -> &'static str {
    image::guess_format(data)
        .or_else(|_| ImageFormat::from_path(path))
        .map(|format| format.to_mime_type())
        .unwrap_or(FALLBACK_MIME)
}
