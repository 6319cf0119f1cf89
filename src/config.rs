//! Configuration management for the image-gate binary.
//!
//! This module provides the CLI for the two subcommands:
//! - `serve`: run the HTTP server with the image middleware
//! - `sign`: print a signed image URL
//!
//! Every option can also be set through an environment variable with the
//! `IMG_` prefix.
//!
//! # Environment Variables
//!
//! - `IMG_HOST` - Server bind address (default: 0.0.0.0)
//! - `IMG_PORT` - Server port (default: 3000)
//! - `IMG_SOURCE` - Directory of source images (required)
//! - `IMG_BASE_URL` - URL prefix served by the middleware (default: /images)
//! - `IMG_CACHE` - Directory for generated variants (default: system temp dir)
//! - `IMG_CACHE_TIME` - Relative cache lifetime, or `off` (default: +1 day)
//! - `IMG_SIGN_KEY` - HMAC secret for signed URLs (signing disabled if unset)
//! - `IMG_IMAGE_OPTIONS` - JSON file with presets, defaults and cache layout
//! - `IMG_CORS_ORIGINS` - Allowed CORS origins (comma-separated)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::error::ConfigError;
use crate::imaging::ImageServiceOptions;
use crate::server::{MiddlewareOptions, DEFAULT_BASE_URL};
use crate::time::{is_disabled_expression, CacheTime, DEFAULT_CACHE_TIME};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

// =============================================================================
// CLI Arguments
// =============================================================================

/// image-gate - On-the-fly image resizing behind signed URLs.
#[derive(Parser, Debug, Clone)]
#[command(name = "image-gate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the image server
    Serve(ServeConfig),

    /// Generate a signed image URL
    Sign(SignConfig),
}

// =============================================================================
// Serve Command
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "IMG_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "IMG_PORT")]
    pub port: u16,

    // =========================================================================
    // Image Configuration
    // =========================================================================
    /// Directory containing the source images.
    #[arg(long, env = "IMG_SOURCE")]
    pub source: Option<PathBuf>,

    /// URL path prefix handled by the image middleware.
    #[arg(long, default_value = DEFAULT_BASE_URL, env = "IMG_BASE_URL")]
    pub base_url: String,

    /// Directory for generated image variants.
    ///
    /// Defaults to an `image-gate` folder in the system temp directory.
    #[arg(long, env = "IMG_CACHE")]
    pub cache: Option<PathBuf>,

    /// Lifetime of served images, e.g. "+1 day" or "2 hours".
    ///
    /// Use "off" to disable conditional requests and cache headers.
    #[arg(long, default_value = DEFAULT_CACHE_TIME, env = "IMG_CACHE_TIME")]
    pub cache_time: String,

    /// JSON file with image service options (presets, defaults, cache layout).
    #[arg(long, env = "IMG_IMAGE_OPTIONS")]
    pub image_options: Option<PathBuf>,

    // =========================================================================
    // Signing Configuration
    // =========================================================================
    /// Secret key for HMAC-SHA256 signed URLs.
    ///
    /// When not set, image URLs are served without a signature.
    #[arg(long, env = "IMG_SIGN_KEY")]
    pub sign_key: Option<String>,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "IMG_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        let source = match &self.source {
            Some(source) if !source.as_os_str().is_empty() => source,
            _ => {
                return Err(
                    "Source directory is required. Set --source or IMG_SOURCE".to_string(),
                )
            }
        };
        if !source.is_dir() {
            return Err(format!(
                "Source directory does not exist: {}",
                source.display()
            ));
        }

        if !is_disabled_expression(&self.cache_time) {
            CacheTime::parse(&self.cache_time).map_err(|e| e.to_string())?;
        }

        if let Some(path) = &self.image_options {
            if !path.is_file() {
                return Err(format!("Image options file not found: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether signed URLs are required.
    pub fn signing_enabled(&self) -> bool {
        self.sign_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    /// Build middleware options from the command line.
    pub fn to_options(&self) -> Result<MiddlewareOptions, ConfigError> {
        let source = self.source.clone().ok_or(ConfigError::MissingSource)?;

        let image = match &self.image_options {
            Some(path) => ImageServiceOptions::from_json_file(path)?,
            None => ImageServiceOptions::default(),
        };

        let mut options = MiddlewareOptions::new(source)
            .with_base_url(self.base_url.as_str())
            .with_cache_time(Some(&self.cache_time))
            .with_sign_key(self.sign_key.as_deref())
            .with_image_options(image);

        if let Some(cache) = &self.cache {
            options = options.with_cache(cache.clone());
        }

        Ok(options)
    }
}

// =============================================================================
// Sign Command
// =============================================================================

/// Output format of the `sign` command.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignOutputFormat {
    /// The signed URL only
    #[default]
    Url,

    /// JSON object with the URL, signature and inputs
    Json,
}

#[derive(Args, Debug, Clone)]
pub struct SignConfig {
    /// Secret key for HMAC-SHA256 signing.
    #[arg(long, env = "IMG_SIGN_KEY")]
    pub sign_key: String,

    /// URL prefix (or absolute base URL) the image is served under.
    #[arg(long, default_value = DEFAULT_BASE_URL, env = "IMG_BASE_URL")]
    pub base_url: String,

    /// Image path relative to the base URL, e.g. "avatars/me.png".
    #[arg(long)]
    pub path: String,

    /// Query parameter as key=value (repeatable), e.g. --param w=200.
    #[arg(long = "param", value_name = "KEY=VALUE")]
    pub params: Vec<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = SignOutputFormat::Url)]
    pub format: SignOutputFormat,
}

impl SignConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.sign_key.is_empty() {
            return Err("Sign key must not be empty".to_string());
        }
        if self.path.trim_matches('/').is_empty() {
            return Err("Image path must not be empty".to_string());
        }
        Ok(())
    }

    /// Parse `--param key=value` pairs.
    pub fn parse_params(&self) -> Result<Vec<(String, String)>, String> {
        self.params
            .iter()
            .map(|param| match param.split_once('=') {
                Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
                _ => Err(format!("Invalid parameter '{}', expected key=value", param)),
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
