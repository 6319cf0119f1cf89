//! Test utilities for integration tests.
//!
//! Fixtures are generated with the `image` crate into temporary source and
//! cache directories, so every test runs against its own filesystem state.

use std::io::Cursor;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use tempfile::TempDir;

use image_gate::MiddlewareOptions;

/// Name of the fixture image placed in every source directory.
pub const FIXTURE_IMAGE: &str = "phpdish.png";

/// Fixture image dimensions.
pub const FIXTURE_WIDTH: u32 = 200;
pub const FIXTURE_HEIGHT: u32 = 100;

/// Header set by the stub `next` handler so pass-through can be detected.
pub const NEXT_MARKER: &str = "x-next-handler";

/// Source and cache directories that live as long as the test.
pub struct ImageDirs {
    pub source: TempDir,
    pub cache: TempDir,
}

impl ImageDirs {
    /// Create directories with [`FIXTURE_IMAGE`] in the source.
    pub fn new() -> Self {
        let source = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        std::fs::write(
            source.path().join(FIXTURE_IMAGE),
            create_png(FIXTURE_WIDTH, FIXTURE_HEIGHT),
        )
        .unwrap();
        Self { source, cache }
    }

    /// Middleware options over these directories with default settings.
    pub fn options(&self) -> MiddlewareOptions {
        MiddlewareOptions::new(self.source.path()).with_cache(self.cache.path())
    }

    /// Number of files currently stored in the cache directory (recursive).
    pub fn cached_files(&self) -> usize {
        count_files(self.cache.path())
    }
}

fn count_files(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|entry| {
                    let path = entry.path();
                    if path.is_dir() {
                        count_files(&path)
                    } else {
                        1
                    }
                })
                .sum()
        })
        .unwrap_or(0)
}

/// Create a PNG with a horizontal red-to-blue gradient.
pub fn create_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, _| {
        let t = (x * 255 / width.max(1)) as u8;
        Rgb([255 - t, 0, t])
    });
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

/// Build a GET request, optionally with extra headers.
pub fn get(uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

/// Stub for the next handler in the chain.
pub async fn next_handler(_request: Request<Body>) -> Response {
    (StatusCode::OK, [(NEXT_MARKER, "1")], "next").into_response()
}

/// Collect a response body.
pub async fn body_bytes(response: Response) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

/// Dimensions of an encoded image.
pub fn dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).unwrap();
    (img.width(), img.height())
}

/// Read a header as a string, panicking if absent.
pub fn header<'a>(response: &'a Response, name: &str) -> &'a str {
    response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("missing header {}", name))
        .to_str()
        .unwrap()
}
