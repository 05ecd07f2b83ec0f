//! Transform parameter mapping
//!
//! Converts the validated parameter mapping into an ordered list of
//! engine-agnostic transform operations. The precedence rules here are fixed:
//! rotation first, then the gif pre-step, pixel toggles, crop, exactly one
//! resize-family operation, and finally at most one re-encoding operation.
//!
//! Numeric handling is parse-or-default throughout: an unparseable or zero
//! dimension means "unspecified", never an error.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_LETTERBOX_BACKGROUND, DEFAULT_WEBP_QUALITY};
use crate::query::ParamMap;

/// Detected source image format, as reported by the engine's probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
}

impl SourceFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            SourceFormat::Jpeg => "image/jpeg",
            SourceFormat::Png => "image/png",
            SourceFormat::Gif => "image/gif",
            SourceFormat::Webp => "image/webp",
        }
    }
}

/// Metadata about the source image, probed before mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    pub format: SourceFormat,
    /// Animation flag; only probed for gif sources, false otherwise.
    pub animated: bool,
}

/// A single transform operation. The mapper emits these in a fixed order and
/// the engine applies them in sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOp {
    /// Rotate clockwise by one of the four right angles (0 is a no-op).
    Rotate { angle: u16 },
    /// Invert colors.
    Negate,
    /// Flip along the horizontal axis (top becomes bottom).
    FlipVertical,
    /// Mirror along the vertical axis (left becomes right).
    FlipHorizontal,
    /// Convert to black and white.
    Grayscale,
    /// Extract a pixel region.
    Crop {
        left: u32,
        top: u32,
        width: u32,
        height: u32,
    },
    /// Exact resize; an unspecified dimension follows the aspect ratio.
    Resize {
        width: Option<u32>,
        height: Option<u32>,
    },
    /// Aspect-preserving resize fitting inside the given box.
    ResizeFit {
        width: Option<u32>,
        height: Option<u32>,
    },
    /// Aspect-preserving resize padded to the box with a background color.
    Letterbox {
        width: Option<u32>,
        height: Option<u32>,
        background: String,
    },
    /// Re-encode as WebP at the given quality.
    EncodeWebp { quality: u8 },
    /// Re-encode as JPEG at the given quality.
    EncodeJpeg { quality: u8 },
    /// Convert to another container format without quality override.
    ConvertFormat { target: SourceFormat },
}

/// Mapping failures. These are terminal for the whole request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MapRejection {
    #[error("animated gif sources are not transformed")]
    AnimatedGif,
}

/// Maps validated parameters to ordered transform operations.
pub struct TransformMapper;

impl TransformMapper {
    /// Build the operation list for one request.
    ///
    /// Returns `MapRejection::AnimatedGif` for animated gif sources; every
    /// other input maps to a (possibly empty) operation list.
    pub fn map_ops(
        params: &ParamMap,
        meta: &SourceMetadata,
    ) -> Result<Vec<TransformOp>, MapRejection> {
        let mut ops = Vec::new();

        // Rotation, only for the four right angles. Anything else is ignored.
        if let Some(raw) = params.get("rotate") {
            if let Some(angle) = parse_angle(raw) {
                ops.push(TransformOp::Rotate { angle });
            }
        }

        // Gifs are converted to png; animated ones are refused outright.
        if meta.format == SourceFormat::Gif {
            if meta.animated {
                return Err(MapRejection::AnimatedGif);
            }
            ops.push(TransformOp::ConvertFormat {
                target: SourceFormat::Png,
            });
        }

        // Requested dimensions never exceed the source.
        let width = params
            .get("w")
            .and_then(parse_dimension)
            .map(|w| w.min(meta.width));
        let height = params
            .get("h")
            .and_then(parse_dimension)
            .map(|h| h.min(meta.height));

        if params.contains("negative") {
            ops.push(TransformOp::Negate);
        }
        if params.contains("flip") {
            ops.push(TransformOp::FlipVertical);
        }
        if params.contains("flop") {
            ops.push(TransformOp::FlipHorizontal);
        }
        if params.contains("grayscale") || params.contains("greyscale") {
            ops.push(TransformOp::Grayscale);
        }

        let mut cropped = false;
        if let Some(raw) = params.get("crop") {
            if let Some([left, top, crop_width, crop_height]) = parse_crop(raw, meta) {
                ops.push(TransformOp::Crop {
                    left,
                    top,
                    width: crop_width,
                    height: crop_height,
                });
                cropped = true;
            }
        }

        // The resize family is mutually exclusive; first match wins.
        if let Some(raw) = params.get("resize") {
            let (resize_width, resize_height) = parse_dimension_pair(raw);
            ops.push(TransformOp::Resize {
                width: resize_width,
                height: resize_height,
            });
        } else if let Some(raw) = params.get("fit") {
            let (fit_width, fit_height) = parse_dimension_pair(raw);
            ops.push(TransformOp::ResizeFit {
                width: fit_width,
                height: fit_height,
            });
        } else if let Some(raw) = params.get("lb") {
            let (lb_width, lb_height) = parse_dimension_pair(raw);
            let background = params
                .get("background")
                .filter(|bg| !bg.is_empty())
                .unwrap_or(DEFAULT_LETTERBOX_BACKGROUND)
                .to_string();
            ops.push(TransformOp::Letterbox {
                width: lb_width,
                height: lb_height,
                background,
            });
        } else if params.contains("w") || params.contains("h") {
            // Without a crop, w/h resizing is bounded by the source aspect
            // ratio; with one, the requested size is taken literally.
            if cropped {
                ops.push(TransformOp::Resize { width, height });
            } else {
                ops.push(TransformOp::ResizeFit { width, height });
            }
        }

        // Re-encoding: webp wins over a jpeg quality override.
        if params.contains("webp") {
            let quality = params
                .get("quality")
                .and_then(parse_quality)
                .unwrap_or(DEFAULT_WEBP_QUALITY);
            ops.push(TransformOp::EncodeWebp { quality });
        } else if meta.format == SourceFormat::Jpeg {
            if let Some(quality) = params.get("quality").and_then(parse_quality) {
                ops.push(TransformOp::EncodeJpeg { quality });
            }
        }

        tracing::debug!(ops = ops.len(), "Mapped transform parameters");

        Ok(ops)
    }
}

/// Parse a rotation angle; only 0, 90, 180 and 270 are meaningful.
fn parse_angle(raw: &str) -> Option<u16> {
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|angle| matches!(angle, 0 | 90 | 180 | 270))
}

/// Parse a dimension. Zero, negative and unparseable values all mean
/// "unspecified" so a bad value degrades to auto instead of failing.
fn parse_dimension(raw: &str) -> Option<u32> {
    match raw.trim().parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(n) => Some(n),
    }
}

/// Split a `w,h` style value into dimensions; missing or unparseable
/// components are unspecified.
fn parse_dimension_pair(raw: &str) -> (Option<u32>, Option<u32>) {
    let mut parts = raw.split(',');
    let width = parts.next().and_then(parse_dimension);
    let height = parts.next().and_then(parse_dimension);
    (width, height)
}

/// Parse a quality override, clamped to 0..=100.
fn parse_quality(raw: &str) -> Option<u8> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|q| q.is_finite())
        .map(|q| q.clamp(0.0, 100.0).round() as u8)
}

/// Parse the four crop components. Values with a `px` suffix are absolute
/// pixel offsets; bare numbers are percentages of the source width (indices
/// 0 and 2) or height (1 and 3), rounded to the nearest pixel. A list that
/// does not have exactly four components yields no crop at all.
fn parse_crop(raw: &str, meta: &SourceMetadata) -> Option<[u32; 4]> {
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() != 4 {
        return None;
    }

    let mut values = [0u32; 4];
    for (index, part) in parts.iter().enumerate() {
        let part = part.trim();
        values[index] = if let Some(px) = part.strip_suffix("px") {
            parse_non_negative(px)
        } else {
            let base = if index % 2 == 0 {
                meta.width
            } else {
                meta.height
            };
            part.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|pct| (base as f64 * (pct / 100.0)).round() as u32)
                .unwrap_or(0)
        };
    }
    Some(values)
}

fn parse_non_negative(raw: &str) -> u32 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as u32)
        .unwrap_or(0)
}
