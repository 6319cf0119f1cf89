//! Image transformer.
//!
//! Decodes a source image, applies the requested [`Manipulations`] and
//! encodes the result.
//!
//! # Design Decisions
//!
//! - **Always decode/encode**: a variant is produced by a full decode and
//!   re-encode, even when no manipulation is requested. Variants are cached,
//!   so the cost is paid once per variant.
//!
//! - **Pixel budget**: when a maximum image size is configured, the target
//!   box is scaled down proportionally until `width * height` fits. The
//!   request is never rejected for asking too much. Independently of the
//!   budget, no side of the target box exceeds [`MAX_DIMENSION`], and crops
//!   are cut from the source before resizing, so no intermediate buffer is
//!   larger than the output.
//!
//! - **Quality control**: quality only affects JPEG output. PNG, GIF and WebP
//!   (lossless) ignore it.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::error::ImageError;

use super::params::{Fit, Flip, Manipulations, OutputFormat, MAX_DIMENSION};

/// Default output quality (1-100).
pub const DEFAULT_QUALITY: u8 = 90;

/// Minimum allowed quality.
pub const MIN_QUALITY: u8 = 1;

/// Maximum allowed quality.
pub const MAX_QUALITY: u8 = 100;

const RESIZE_FILTER: FilterType = FilterType::Lanczos3;

// =============================================================================
// Transformer
// =============================================================================

/// Stateless transformer turning source bytes into an encoded variant.
///
/// # Example
///
/// ```ignore
/// use image_gate::imaging::{ImageTransformer, Manipulations};
///
/// let transformer = ImageTransformer::new();
/// let mut manipulations = Manipulations::default();
/// manipulations.width = Some(200);
///
/// let thumbnail = transformer.transform(&source_png, &manipulations, None)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct ImageTransformer {}

impl ImageTransformer {
    pub fn new() -> Self {
        Self {}
    }

    /// Produce the variant of `source` described by `manipulations`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::TransformFailed`] if the source format is unknown
    /// or decoding/encoding fails.
    pub fn transform(
        &self,
        source: &[u8],
        manipulations: &Manipulations,
        max_image_size: Option<u64>,
    ) -> Result<Bytes, ImageError> {
        let source_format = image::guess_format(source).map_err(transform_error)?;

        let mut img = ImageReader::with_format(Cursor::new(source), source_format)
            .decode()
            .map_err(transform_error)?;

        img = match manipulations.rotation {
            90 => img.rotate90(),
            180 => img.rotate180(),
            270 => img.rotate270(),
            _ => img,
        };

        if let Some(target) = target_box(img.dimensions(), manipulations, max_image_size) {
            img = apply_fit(img, target, manipulations.fit);
        }

        img = match manipulations.flip {
            Some(Flip::Horizontal) => img.fliph(),
            Some(Flip::Vertical) => img.flipv(),
            Some(Flip::Both) => img.fliph().flipv(),
            None => img,
        };

        if let Some(amount) = manipulations.blur {
            img = img.blur(f32::from(amount) / 2.0);
        }

        let format = manipulations
            .format
            .or_else(|| OutputFormat::from_image_format(source_format))
            .unwrap_or(OutputFormat::Jpeg);

        encode(&img, format, manipulations.quality)
    }
}

fn transform_error(err: impl std::fmt::Display) -> ImageError {
    ImageError::TransformFailed {
        message: err.to_string(),
    }
}

/// Compute the box the image has to fit into, or `None` to keep it as is.
fn target_box(
    (width, height): (u32, u32),
    manipulations: &Manipulations,
    max_image_size: Option<u64>,
) -> Option<(u32, u32)> {
    let ratio = f64::from(width) / f64::from(height.max(1));

    let side = |value: f64| (value.round() as u32).clamp(1, MAX_DIMENSION);

    let requested = match (manipulations.width, manipulations.height) {
        (Some(w), Some(h)) => Some((side(f64::from(w)), side(f64::from(h)))),
        (Some(w), None) => {
            let w = side(f64::from(w));
            Some((w, side(f64::from(w) / ratio)))
        }
        (None, Some(h)) => {
            let h = side(f64::from(h));
            Some((side(f64::from(h) * ratio), h))
        }
        (None, None) => None,
    };

    let (w, h) = requested.unwrap_or((width, height));
    let exceeds = |max: u64| {
        u64::from(w)
            .checked_mul(u64::from(h))
            .map_or(true, |pixels| pixels > max)
    };
    let (w, h) = match max_image_size {
        Some(max) if exceeds(max) => {
            let scale = (max as f64 / (f64::from(w) * f64::from(h))).sqrt();
            (
                ((f64::from(w) * scale).floor() as u32).max(1),
                ((f64::from(h) * scale).floor() as u32).max(1),
            )
        }
        _ => (w, h),
    };

    if (w, h) == (width, height) {
        None
    } else {
        Some((w, h))
    }
}

fn apply_fit(img: DynamicImage, (w, h): (u32, u32), fit: Fit) -> DynamicImage {
    let (src_w, src_h) = img.dimensions();
    match fit {
        Fit::Contain => img.resize(w, h, RESIZE_FILTER),
        Fit::Max if src_w <= w && src_h <= h => img,
        Fit::Max => img.resize(w, h, RESIZE_FILTER),
        Fit::Stretch => img.resize_exact(w, h, RESIZE_FILTER),
        Fit::Crop(position) => {
            // Cut the target aspect ratio out of the source, then scale it
            let target_ratio = f64::from(w) / f64::from(h);
            let (crop_w, crop_h) = if f64::from(src_w) / f64::from(src_h) > target_ratio {
                let crop_w = (f64::from(src_h) * target_ratio).round() as u32;
                (crop_w.clamp(1, src_w), src_h)
            } else {
                let crop_h = (f64::from(src_w) / target_ratio).round() as u32;
                (src_w, crop_h.clamp(1, src_h))
            };

            let (anchor_x, anchor_y) = position.anchors();
            let x = u64::from(src_w - crop_w) * u64::from(anchor_x) / 2;
            let y = u64::from(src_h - crop_h) * u64::from(anchor_y) / 2;
            img.crop_imm(x as u32, y as u32, crop_w, crop_h)
                .resize_exact(w, h, RESIZE_FILTER)
        }
    }
}

fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Bytes, ImageError> {
    let mut output = Vec::new();

    match format {
        OutputFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut output, clamp_quality(quality));
            encoder
                .encode_image(&img.to_rgb8())
                .map_err(transform_error)?;
        }
        OutputFormat::Png => {
            img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
                .map_err(transform_error)?;
        }
        OutputFormat::Gif | OutputFormat::WebP => {
            DynamicImage::ImageRgba8(img.to_rgba8())
                .write_to(&mut Cursor::new(&mut output), format.image_format())
                .map_err(transform_error)?;
        }
    }

    Ok(Bytes::from(output))
}

// =============================================================================
// Utility Functions
// =============================================================================

/// Validate a quality parameter (1-100).
#[inline]
pub fn is_valid_quality(quality: u8) -> bool {
    (MIN_QUALITY..=MAX_QUALITY).contains(&quality)
}

/// Clamp quality to the valid range.
#[inline]
pub fn clamp_quality(quality: u8) -> u8 {
    quality.clamp(MIN_QUALITY, MAX_QUALITY)
}

// =============================================================================
// Tests
// =============================================================================
