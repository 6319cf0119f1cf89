//! HTTP layer: the image middleware and the router around it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │                                                                 │
//! │  ┌──────────────┐  ┌─────────────┐  ┌────────────────────────┐  │
//! │  │  middleware  │  │  signature  │  │       responder        │  │
//! │  │ (path match, │  │ (signed URL │  │ (304 / cache headers)  │  │
//! │  │  exceptions) │  │  + builder) │  │                        │  │
//! │  └──────────────┘  └─────────────┘  └────────────────────────┘  │
//! │  ┌──────────────┐  ┌─────────────┐  ┌────────────────────────┐  │
//! │  │   options    │  │  handlers   │  │        routes          │  │
//! │  └──────────────┘  └─────────────┘  └────────────────────────┘  │
//! └────────────────────────────────┬────────────────────────────────┘
//!                                  ▼
//!                     ImageService (crate::imaging)
//! ```

pub mod handlers;
pub mod middleware;
pub mod options;
pub mod responder;
pub mod routes;
pub mod signature;

pub use handlers::{fallback_handler, health_handler, ErrorResponse, HealthResponse};
pub use middleware::{image_middleware, ImageMiddleware};
pub use options::{
    ExceptionHandler, MiddlewareOptions, ResolvedOptions, DEFAULT_BASE_URL,
    DEFAULT_CACHE_DIR_NAME,
};
pub use responder::{apply_cache_headers, is_not_modified, respond};
pub use routes::{create_router, RouterConfig};
pub use signature::{Signature, UrlBuilder, SIGNATURE_PARAM};
