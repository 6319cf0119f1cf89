//! Image production layer.
//!
//! This module turns a request path plus query parameters into an HTTP
//! response carrying the requested image variant.
//!
//! # Components
//!
//! - [`ImageService`]: Trait boundary used by the middleware
//! - [`LocalImageService`]: Filesystem implementation with an on-disk variant cache
//! - [`ImageTransformer`]: Decode, manipulate and encode with the `image` crate
//! - [`Manipulations`]: Typed view of the `w`, `h`, `fit`, ... query parameters
//! - [`ResponseFactory`]: Hook that builds the response for a cached variant
//! - [`ImageServiceOptions`]: Presets, defaults and cache layout settings

mod encoder;
mod options;
mod params;
mod response;
mod service;

pub use encoder::{
    clamp_quality, is_valid_quality, ImageTransformer, DEFAULT_QUALITY, MAX_QUALITY, MIN_QUALITY,
};
pub use options::{ImageServiceOptions, DEFAULT_MAX_IMAGE_SIZE};
pub use params::{
    canonical_query, parse_query, CropPosition, Fit, Flip, Manipulations, OutputFormat,
    QueryParams, MAX_DIMENSION,
};
pub use response::{detect_mime, ImageResponseFactory, ResponseFactory, FALLBACK_MIME};
pub use service::{ImageService, LocalImageService};
