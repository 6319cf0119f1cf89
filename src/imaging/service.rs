//! Image service: the boundary between the HTTP layer and image production.
//!
//! # Pipeline
//!
//! ```text
//! request path ──► source_path() ──► all_params() ──► cache_path()
//!                                                          │
//!                                          cached? ◄───────┘
//!                                          │    │
//!                                      yes │    │ no
//!                                          │    ▼
//!                                          │  read source ─► transform ─► write
//!                                          ▼                                │
//!                                   ResponseFactory::create() ◄─────────────┘
//! ```

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{ImageError, StorageError};
use crate::storage::LocalStorage;

use super::encoder::ImageTransformer;
use super::options::ImageServiceOptions;
use super::params::{canonical_query, Manipulations, QueryParams};
use super::response::{ImageResponseFactory, ResponseFactory};

/// Params that select or authenticate a variant without changing its pixels.
const NON_MANIPULATION_PARAMS: &[&str] = &["s", "p"];

// =============================================================================
// Image Service Trait
// =============================================================================

/// Produces image responses for matched request paths.
///
/// `request_path` is always the decoded request path, including the
/// middleware's base URL.
#[async_trait]
pub trait ImageService: Send + Sync {
    /// Map a request path to the path of its source image.
    fn source_path(&self, request_path: &str) -> Result<String, ImageError>;

    /// Last modification time of a source image as Unix seconds.
    async fn source_timestamp(&self, source_path: &str) -> Result<i64, ImageError>;

    /// Produce (or reuse) the variant and build its response.
    async fn image_response(
        &self,
        request_path: &str,
        params: &QueryParams,
    ) -> Result<Response, ImageError>;
}

// =============================================================================
// Local Image Service
// =============================================================================

/// Filesystem-backed image service with an on-disk variant cache.
///
/// # Example
///
/// ```ignore
/// use image_gate::imaging::{ImageServiceOptions, LocalImageService};
/// use image_gate::storage::LocalStorage;
///
/// let service = LocalImageService::new(
///     LocalStorage::new("/var/www/images"),
///     LocalStorage::new("/var/cache/images"),
///     "/images",
///     ImageServiceOptions::default(),
/// );
///
/// let response = service.image_response("/images/cat.png", &params).await?;
/// ```
pub struct LocalImageService {
    source: LocalStorage,
    cache: LocalStorage,
    base_url: String,
    options: ImageServiceOptions,
    transformer: ImageTransformer,
    response_factory: Arc<dyn ResponseFactory>,
}

impl LocalImageService {
    pub fn new(
        source: LocalStorage,
        cache: LocalStorage,
        base_url: &str,
        options: ImageServiceOptions,
    ) -> Self {
        Self {
            source,
            cache,
            base_url: base_url.trim_matches('/').to_string(),
            options,
            transformer: ImageTransformer::new(),
            response_factory: Arc::new(ImageResponseFactory),
        }
    }

    /// Replace the response factory.
    pub fn set_response_factory(&mut self, factory: Arc<dyn ResponseFactory>) {
        self.response_factory = factory;
    }

    /// The installed response factory.
    pub fn response_factory(&self) -> &Arc<dyn ResponseFactory> {
        &self.response_factory
    }

    pub fn source(&self) -> &LocalStorage {
        &self.source
    }

    pub fn cache(&self) -> &LocalStorage {
        &self.cache
    }

    pub fn options(&self) -> &ImageServiceOptions {
        &self.options
    }

    /// Merge defaults, presets selected with `p`, and the request params.
    ///
    /// Later sources override earlier ones.
    pub fn all_params(&self, params: &QueryParams) -> QueryParams {
        let mut all = self.options.defaults.clone();

        if let Some(names) = params.get("p") {
            for name in names.split(',').map(str::trim) {
                if let Some(preset) = self.options.presets.get(name) {
                    all.extend(preset.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            }
        }

        all.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
        all
    }

    /// Cache location of the variant of `source_path` described by `params`.
    ///
    /// `params` must already be merged with [`Self::all_params`]. The source
    /// modification time is part of the key, so replacing a source yields
    /// new variants instead of serving stale ones.
    pub fn cache_path(
        &self,
        source_path: &str,
        params: &QueryParams,
        modified_time: i64,
    ) -> String {
        let canonical = canonical_query(params, NON_MANIPULATION_PARAMS);
        let hash = hex::encode(Sha256::digest(format!(
            "{}?{}@{}",
            source_path, canonical, modified_time
        )));

        let mut path = if self.options.group_cache_in_folders {
            format!("{}/{}", source_path, hash)
        } else {
            hash
        };

        if self.options.cache_with_file_extensions {
            let extension = Manipulations::from_params(params)
                .format
                .map(|format| format.extension().to_string())
                .or_else(|| {
                    Path::new(source_path)
                        .extension()
                        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
                });
            if let Some(extension) = extension {
                path.push('.');
                path.push_str(&extension);
            }
        }

        path
    }

    /// Ensure the variant exists in the cache and return its cache path.
    pub async fn make_image(
        &self,
        request_path: &str,
        params: &QueryParams,
    ) -> Result<String, ImageError> {
        let source_path = self.source_path(request_path)?;
        let params = self.all_params(params);
        let modified_time = self.source_timestamp(&source_path).await?;
        let cache_path = self.cache_path(&source_path, &params, modified_time);

        if self.cache.exists(&cache_path).await {
            debug!(source = %source_path, cache = %cache_path, "Variant cache hit");
            return Ok(cache_path);
        }

        let data = self
            .source
            .read(&source_path)
            .await
            .map_err(|e| source_error(&source_path, e))?;

        let manipulations = Manipulations::from_params(&params);
        let transformer = self.transformer.clone();
        let max_image_size = self.options.max_image_size;
        let output = tokio::task::spawn_blocking(move || {
            transformer.transform(&data, &manipulations, max_image_size)
        })
        .await
        .map_err(|e| ImageError::TransformFailed {
            message: e.to_string(),
        })??;

        self.cache
            .write(&cache_path, &output)
            .await
            .map_err(|e| ImageError::Storage(e.to_string()))?;

        debug!(
            source = %source_path,
            cache = %cache_path,
            bytes = output.len(),
            "Variant cache miss, image generated"
        );
        Ok(cache_path)
    }
}

fn source_error(source_path: &str, err: StorageError) -> ImageError {
    match err {
        StorageError::NotFound(_) | StorageError::InvalidPath(_) => ImageError::SourceNotFound {
            path: source_path.to_string(),
        },
        StorageError::Io(message) => ImageError::Storage(message),
    }
}

#[async_trait]
impl ImageService for LocalImageService {
    fn source_path(&self, request_path: &str) -> Result<String, ImageError> {
        let mut path = request_path.trim_start_matches('/');
        if !self.base_url.is_empty() {
            path = path.strip_prefix(self.base_url.as_str()).unwrap_or(path);
        }
        let path = path.trim_start_matches('/');

        if path.is_empty() {
            return Err(ImageError::SourceNotFound {
                path: request_path.to_string(),
            });
        }

        Ok(match self.options.source_path_prefix.as_deref() {
            Some(prefix) if !prefix.trim_matches('/').is_empty() => {
                format!("{}/{}", prefix.trim_matches('/'), path)
            }
            _ => path.to_string(),
        })
    }

    async fn source_timestamp(&self, source_path: &str) -> Result<i64, ImageError> {
        self.source
            .timestamp(source_path)
            .await
            .map_err(|e| source_error(source_path, e))
    }

    async fn image_response(
        &self,
        request_path: &str,
        params: &QueryParams,
    ) -> Result<Response, ImageError> {
        let cache_path = self.make_image(request_path, params).await?;
        self.response_factory.create(&self.cache, &cache_path).await
    }
}

// =============================================================================
// Tests
// =============================================================================
