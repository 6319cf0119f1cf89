use thiserror::Error;

/// Errors raised while serving a matched image request.
///
/// Every variant is routed through the middleware's exception handler.
#[derive(Debug, Clone, Error)]
pub enum ImageError {
    /// The requested source image does not exist
    #[error("Source image not found: {path}")]
    SourceNotFound { path: String },

    /// The requested variant could not be produced
    #[error("Failed to transform image: {message}")]
    TransformFailed { message: String },

    /// Signed URL verification failed
    #[error("Signature error: {0}")]
    Signature(#[from] SignatureError),

    /// A cached variant disappeared between creation and read
    #[error("Cached image not found: {path}")]
    CachedImageNotFound { path: String },

    /// Filesystem failure other than a missing file
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ImageError {
    /// Short identifier used in JSON error bodies and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ImageError::SourceNotFound { .. } => "not_found",
            ImageError::TransformFailed { .. } => "transform_failed",
            ImageError::Signature(SignatureError::Missing) => "missing_signature",
            ImageError::Signature(SignatureError::Malformed) => "invalid_signature_format",
            ImageError::Signature(SignatureError::Mismatch) => "invalid_signature",
            ImageError::CachedImageNotFound { .. } => "cache_error",
            ImageError::Storage(_) => "storage_error",
        }
    }
}

/// Signed URL verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The `s` query parameter is absent
    #[error("Missing signature parameter")]
    Missing,

    /// The `s` parameter is repeated or not valid hex
    #[error("Invalid signature format")]
    Malformed,

    /// The signature does not match the path and query
    #[error("Invalid signature")]
    Mismatch,
}

/// Errors from the local filesystem storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Object does not exist (or is not a regular file)
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Path escapes the storage root or is empty
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(String),
}

/// Construction-time configuration errors.
///
/// These are returned before any request is served and never reach the
/// exception handler.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// No source directory was configured
    #[error("The \"source\" option is required")]
    MissingSource,

    /// The cache time expression could not be parsed
    #[error("Invalid cache time \"{expression}\": {reason}")]
    InvalidCacheTime { expression: String, reason: String },

    /// The base URL is not a usable path prefix
    #[error("Invalid base URL \"{0}\"")]
    InvalidBaseUrl(String),

    /// Image service options could not be loaded
    #[error("Invalid image options: {0}")]
    InvalidImageOptions(String),
}
