//! Image service options.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

use super::params::QueryParams;

/// Default output pixel budget (`width * height`).
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = 2000 * 2000;

/// Options for [`LocalImageService`](super::LocalImageService).
///
/// Loadable from JSON, every field is optional:
///
/// ```json
/// {
///   "source_path_prefix": "uploads",
///   "defaults": { "q": "80" },
///   "presets": { "small": { "w": "200", "h": "200", "fit": "crop" } },
///   "max_image_size": 4000000,
///   "group_cache_in_folders": true,
///   "cache_with_file_extensions": false
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageServiceOptions {
    /// Directory inside the source root that request paths are resolved against
    pub source_path_prefix: Option<String>,

    /// Params applied to every request
    pub defaults: QueryParams,

    /// Named param sets selectable with `p=name[,name...]`
    pub presets: BTreeMap<String, QueryParams>,

    /// Maximum output size in pixels (`width * height`). `null` removes the
    /// budget; each side is still limited to
    /// [`MAX_DIMENSION`](super::params::MAX_DIMENSION).
    pub max_image_size: Option<u64>,

    /// Store variants in a folder named after their source path
    pub group_cache_in_folders: bool,

    /// Append the output format extension to cached variants
    pub cache_with_file_extensions: bool,
}

impl Default for ImageServiceOptions {
    fn default() -> Self {
        Self {
            source_path_prefix: None,
            defaults: QueryParams::new(),
            presets: BTreeMap::new(),
            max_image_size: Some(DEFAULT_MAX_IMAGE_SIZE),
            group_cache_in_folders: true,
            cache_with_file_extensions: false,
        }
    }
}

impl ImageServiceOptions {
    /// Parse options from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::InvalidImageOptions(e.to_string()))
    }

    /// Load options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::InvalidImageOptions(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }
}
