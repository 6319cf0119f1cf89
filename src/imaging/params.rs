//! Query parameters and the manipulations they describe.
//!
//! Parameter names follow the short URL vocabulary used by image CDNs:
//!
//! | Param  | Meaning                                   | Values                          |
//! |--------|-------------------------------------------|---------------------------------|
//! | `w`    | target width in pixels                    | positive integer                |
//! | `h`    | target height in pixels                   | positive integer                |
//! | `dpr`  | device pixel ratio multiplier             | 1 to 8                          |
//! | `fit`  | how the image fills the `w` x `h` box     | `contain`, `max`, `stretch`, `crop`, `crop-<position>` |
//! | `or`   | rotation in degrees                       | `0`, `90`, `180`, `270`         |
//! | `flip` | mirror the image                          | `h`, `v`, `both`                |
//! | `blur` | gaussian blur amount                      | 0 to 100                        |
//! | `q`    | output quality (JPEG only)                | 1 to 100                        |
//! | `fm`   | output format                             | `jpg`, `pjpg`, `png`, `gif`, `webp` |
//! | `p`    | comma separated preset names              | names from the service options  |
//! | `s`    | URL signature                             | hex HMAC                        |
//!
//! Values that fail to parse are ignored rather than rejected.

use std::collections::BTreeMap;

use image::ImageFormat;
use url::form_urlencoded;

use super::encoder::{is_valid_quality, DEFAULT_QUALITY};

/// Decoded query parameters, sorted by name. A repeated name keeps its last value.
pub type QueryParams = BTreeMap<String, String>;

/// Parse a raw query string into [`QueryParams`].
pub fn parse_query(query: &str) -> QueryParams {
    form_urlencoded::parse(query.as_bytes())
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect()
}

/// Serialize params in sorted order, skipping the names in `exclude`.
pub fn canonical_query(params: &QueryParams, exclude: &[&str]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        if exclude.contains(&key.as_str()) {
            continue;
        }
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

// =============================================================================
// Manipulation Types
// =============================================================================

/// Anchor used when `fit=crop` has to discard part of the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropPosition {
    #[default]
    Center,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl CropPosition {
    fn parse(value: &str) -> Option<Self> {
        let position = match value {
            "center" => CropPosition::Center,
            "top" => CropPosition::Top,
            "bottom" => CropPosition::Bottom,
            "left" => CropPosition::Left,
            "right" => CropPosition::Right,
            "top-left" => CropPosition::TopLeft,
            "top-right" => CropPosition::TopRight,
            "bottom-left" => CropPosition::BottomLeft,
            "bottom-right" => CropPosition::BottomRight,
            _ => return None,
        };
        Some(position)
    }

    /// Horizontal and vertical anchor, each in `{0, 1, 2}` (start, middle, end).
    pub fn anchors(self) -> (u32, u32) {
        match self {
            CropPosition::Center => (1, 1),
            CropPosition::Top => (1, 0),
            CropPosition::Bottom => (1, 2),
            CropPosition::Left => (0, 1),
            CropPosition::Right => (2, 1),
            CropPosition::TopLeft => (0, 0),
            CropPosition::TopRight => (2, 0),
            CropPosition::BottomLeft => (0, 2),
            CropPosition::BottomRight => (2, 2),
        }
    }
}

/// How the image is fitted into the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fit {
    /// Scale to fit inside the box, keeping the aspect ratio
    #[default]
    Contain,
    /// Like `Contain`, but never upscale
    Max,
    /// Scale to exactly the box, ignoring the aspect ratio
    Stretch,
    /// Scale to cover the box, then cut the overflow
    Crop(CropPosition),
}

impl Fit {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "contain" => Some(Fit::Contain),
            "max" => Some(Fit::Max),
            "stretch" => Some(Fit::Stretch),
            "crop" => Some(Fit::Crop(CropPosition::Center)),
            other => other
                .strip_prefix("crop-")
                .and_then(CropPosition::parse)
                .map(Fit::Crop),
        }
    }
}

/// Mirror axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flip {
    Horizontal,
    Vertical,
    Both,
}

/// Encodable output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Gif,
    WebP,
}

impl OutputFormat {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "jpg" | "jpeg" | "pjpg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "gif" => Some(OutputFormat::Gif),
            "webp" => Some(OutputFormat::WebP),
            _ => None,
        }
    }

    /// Output format matching a decoded source format, if it can be encoded.
    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(OutputFormat::Jpeg),
            ImageFormat::Png => Some(OutputFormat::Png),
            ImageFormat::Gif => Some(OutputFormat::Gif),
            ImageFormat::WebP => Some(OutputFormat::WebP),
            _ => None,
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Gif => ImageFormat::Gif,
            OutputFormat::WebP => ImageFormat::WebP,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Gif => "gif",
            OutputFormat::WebP => "webp",
        }
    }
}

// =============================================================================
// Manipulations
// =============================================================================

/// Largest accepted output width or height, after `dpr` is applied.
pub const MAX_DIMENSION: u32 = 8192;

/// The full set of manipulations requested for one image variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Manipulations {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fit: Fit,
    pub rotation: u16,
    pub flip: Option<Flip>,
    pub blur: Option<u8>,
    pub quality: u8,
    pub format: Option<OutputFormat>,
}

impl Default for Manipulations {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            fit: Fit::default(),
            rotation: 0,
            flip: None,
            blur: None,
            quality: DEFAULT_QUALITY,
            format: None,
        }
    }
}

impl Manipulations {
    /// Read manipulations from (already merged) query params.
    pub fn from_params(params: &QueryParams) -> Self {
        let get = |name: &str| params.get(name).map(|v| v.trim());

        let dpr = get("dpr")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|dpr| (1.0..=8.0).contains(dpr))
            .unwrap_or(1.0);
        let dimension = |name: &str| {
            get(name)
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| *v > 0)
                .map(|v| ((f64::from(v) * dpr).round() as u32).clamp(1, MAX_DIMENSION))
        };

        Self {
            width: dimension("w"),
            height: dimension("h"),
            fit: get("fit").and_then(Fit::parse).unwrap_or_default(),
            rotation: get("or")
                .and_then(|v| v.parse::<u16>().ok())
                .filter(|deg| matches!(deg, 0 | 90 | 180 | 270))
                .unwrap_or(0),
            flip: get("flip").and_then(|v| match v {
                "h" => Some(Flip::Horizontal),
                "v" => Some(Flip::Vertical),
                "both" => Some(Flip::Both),
                _ => None,
            }),
            blur: get("blur")
                .and_then(|v| v.parse::<u8>().ok())
                .filter(|amount| (1..=100).contains(amount)),
            quality: get("q")
                .and_then(|v| v.parse::<u8>().ok())
                .filter(|q| is_valid_quality(*q))
                .unwrap_or(DEFAULT_QUALITY),
            format: get("fm").and_then(OutputFormat::parse),
        }
    }
}
