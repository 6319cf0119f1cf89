//! Signed URLs for image requests.
//!
//! # URL Signing Scheme
//!
//! A URL is signed by computing an HMAC-SHA256 over its decoded path (without
//! the leading slash) and its sorted query parameters, excluding `s`:
//!
//! ```text
//! s = hex(HMAC-SHA256(sign_key, "{path}?{canonical_query}"))
//! ```
//!
//! ```text
//! /images/phpdish.png?w=50&s=3f5a...
//!  signed message: "images/phpdish.png?w=50"
//! ```
//!
//! The path includes the middleware base URL, so a signature issued for one
//! mount point is not valid under another.
//!
//! # Example
//!
//! ```rust
//! use image_gate::server::{Signature, UrlBuilder};
//!
//! let signature = Signature::new("my-secret-key");
//! let builder = UrlBuilder::new("/images", Some(signature.clone()));
//!
//! let url = builder.url("phpdish.png", &[("w", "50")]);
//! assert!(url.starts_with("/images/phpdish.png?w=50&s="));
//! ```

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use url::form_urlencoded;

use crate::error::SignatureError;
use crate::imaging::{canonical_query, parse_query, QueryParams};

/// HMAC-SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Name of the query parameter carrying the signature.
pub const SIGNATURE_PARAM: &str = "s";

// =============================================================================
// Signature
// =============================================================================

/// Signs and verifies image request URLs with a shared secret.
#[derive(Clone)]
pub struct Signature {
    sign_key: Vec<u8>,
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature")
            .field("sign_key", &"<redacted>")
            .finish()
    }
}

impl Signature {
    pub fn new(sign_key: impl AsRef<[u8]>) -> Self {
        Self {
            sign_key: sign_key.as_ref().to_vec(),
        }
    }

    /// Hex-encoded signature for `path` and `params`. Any `s` param is ignored.
    pub fn sign(&self, path: &str, params: &QueryParams) -> String {
        hex::encode(self.compute(path, params))
    }

    /// Verify the `s` param of `params` against `path` and the other params.
    ///
    /// # Errors
    ///
    /// - [`SignatureError::Missing`] if `s` is absent
    /// - [`SignatureError::Malformed`] if `s` is not hex
    /// - [`SignatureError::Mismatch`] if `s` does not match
    pub fn validate(&self, path: &str, params: &QueryParams) -> Result<(), SignatureError> {
        let provided = params
            .get(SIGNATURE_PARAM)
            .ok_or(SignatureError::Missing)?;
        let provided = hex::decode(provided).map_err(|_| SignatureError::Malformed)?;

        let expected = self.compute(path, params);

        // Constant-time comparison; a length mismatch compares unequal
        if provided.as_slice().ct_eq(expected.as_slice()).into() {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Verify a raw query string. A repeated `s` param is malformed.
    pub fn validate_query(&self, path: &str, query: &str) -> Result<(), SignatureError> {
        let occurrences = form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key == SIGNATURE_PARAM)
            .count();
        if occurrences > 1 {
            return Err(SignatureError::Malformed);
        }

        self.validate(path, &parse_query(query))
    }

    fn compute(&self, path: &str, params: &QueryParams) -> Vec<u8> {
        let message = signature_base(path, params);

        let mut mac =
            HmacSha256::new_from_slice(&self.sign_key).expect("HMAC can take key of any size");
        mac.update(message.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

fn signature_base(path: &str, params: &QueryParams) -> String {
    format!(
        "{}?{}",
        path.trim_start_matches('/'),
        canonical_query(params, &[SIGNATURE_PARAM])
    )
}

// =============================================================================
// URL Builder
// =============================================================================

/// Builds (optionally signed) URLs under the middleware's base URL.
///
/// The base URL may be a bare path (`/images`) or absolute
/// (`https://cdn.example.com/images`). Only the path part is signed.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    origin: String,
    base_path: String,
    signature: Option<Signature>,
}

impl UrlBuilder {
    pub fn new(base_url: &str, signature: Option<Signature>) -> Self {
        let (origin, base_path) = split_origin(base_url);
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            base_path: base_path.trim_matches('/').to_string(),
            signature,
        }
    }

    /// Whether URLs produced by this builder carry a signature.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// URL for the image at `path` (relative to the base URL) with `params`.
    pub fn url(&self, path: &str, params: &[(&str, &str)]) -> String {
        let full_path = [self.base_path.as_str(), path.trim_matches('/')]
            .iter()
            .filter(|segment| !segment.is_empty())
            .fold(String::new(), |mut acc, segment| {
                acc.push('/');
                acc.push_str(segment);
                acc
            });
        let full_path = if full_path.is_empty() {
            "/".to_string()
        } else {
            full_path
        };

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in params.iter().filter(|(key, _)| *key != SIGNATURE_PARAM) {
            serializer.append_pair(key, value);
        }

        if let Some(signature) = &self.signature {
            let signed: QueryParams = params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect();
            serializer.append_pair(SIGNATURE_PARAM, &signature.sign(&full_path, &signed));
        }

        let query = serializer.finish();
        let encoded_path = full_path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");

        if query.is_empty() {
            format!("{}{}", self.origin, encoded_path)
        } else {
            format!("{}{}?{}", self.origin, encoded_path, query)
        }
    }
}

/// Split `https://host:port/path` into (`https://host:port`, `/path`).
fn split_origin(base_url: &str) -> (&str, &str) {
    match base_url.find("://") {
        Some(idx) => {
            let after_scheme = idx + 3;
            match base_url[after_scheme..].find('/') {
                Some(slash) => base_url.split_at(after_scheme + slash),
                None => (base_url, ""),
            }
        }
        None => ("", base_url),
    }
}

// =============================================================================
// Tests
// =============================================================================
