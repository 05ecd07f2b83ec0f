//! Raster transform engine
//!
//! Applies the pipeline's operation list with the `image` crate and encodes
//! the result exactly once: the last encode/convert operation decides the
//! output container, otherwise the source format is kept.

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use image::{imageops, AnimationDecoder, DynamicImage, GenericImageView, ImageFormat, RgbaImage};

use crate::color::parse_background;
use crate::traits::{EngineError, EngineResult, TransformEngine, TransformOutput};
use reframe_core::constants::DEFAULT_WEBP_QUALITY;
use reframe_core::{SourceFormat, SourceMetadata, TransformOp};

/// JPEG quality used when no override was requested.
const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Transform engine backed by the `image` crate, with mozjpeg for JPEG and
/// libwebp for WebP encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterEngine;

impl RasterEngine {
    pub fn new() -> Self {
        RasterEngine
    }

    fn decode(blob: &[u8]) -> EngineResult<DynamicImage> {
        image::ImageReader::new(Cursor::new(blob))
            .with_guessed_format()
            .map_err(|e| EngineError::Decode(e.to_string()))?
            .decode()
            .map_err(|e| EngineError::Decode(e.to_string()))
    }

    /// Rotate clockwise by a right angle; anything else is a no-op.
    fn rotate(img: DynamicImage, angle: u16) -> DynamicImage {
        match angle {
            90 => img.rotate90(),
            180 => img.rotate180(),
            270 => img.rotate270(),
            _ => img,
        }
    }

    /// Extract a region, clamped to the image bounds. Degenerate regions
    /// leave the image untouched rather than failing the request.
    fn crop(img: DynamicImage, left: u32, top: u32, width: u32, height: u32) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        if left >= orig_width || top >= orig_height {
            return img;
        }
        let width = width.min(orig_width - left);
        let height = height.min(orig_height - top);
        if width == 0 || height == 0 {
            return img;
        }
        img.crop_imm(left, top, width, height)
    }

    /// Resolve partial dimensions against the source aspect ratio. `None`
    /// means both dimensions were unspecified and the resize is a no-op.
    fn target_dimensions(
        orig_width: u32,
        orig_height: u32,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Option<(u32, u32)> {
        match (width, height) {
            (Some(w), Some(h)) => Some((w, h)),
            (Some(w), None) => {
                let aspect_ratio = orig_height as f32 / orig_width as f32;
                let h = (w as f32 * aspect_ratio).round() as u32;
                Some((w, h.max(1)))
            }
            (None, Some(h)) => {
                let aspect_ratio = orig_width as f32 / orig_height as f32;
                let w = (h as f32 * aspect_ratio).round() as u32;
                Some((w.max(1), h))
            }
            (None, None) => None,
        }
    }

    /// Select a resampling filter based on how far the image is scaled down.
    fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> imageops::FilterType {
        let width_ratio = orig_width as f32 / new_width as f32;
        let height_ratio = orig_height as f32 / new_height as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            imageops::FilterType::Triangle
        } else if max_ratio > 1.5 {
            imageops::FilterType::CatmullRom
        } else {
            imageops::FilterType::Lanczos3
        }
    }

    /// Exact resize; a missing dimension follows the aspect ratio.
    fn resize_exact(img: DynamicImage, width: Option<u32>, height: Option<u32>) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        match Self::target_dimensions(orig_width, orig_height, width, height) {
            Some((target_width, target_height)) => {
                let target_width = target_width.max(1);
                let target_height = target_height.max(1);
                let filter =
                    Self::select_filter(orig_width, orig_height, target_width, target_height);
                img.resize_exact(target_width, target_height, filter)
            }
            None => img,
        }
    }

    /// Scale to fit inside the box, preserving the aspect ratio.
    fn fitted_dimensions(
        orig_width: u32,
        orig_height: u32,
        box_width: u32,
        box_height: u32,
    ) -> (u32, u32) {
        let scale_width = box_width as f32 / orig_width as f32;
        let scale_height = box_height as f32 / orig_height as f32;
        let scale = scale_width.min(scale_height);

        let width = ((orig_width as f32 * scale).round() as u32).max(1);
        let height = ((orig_height as f32 * scale).round() as u32).max(1);
        (width, height)
    }

    /// Aspect-preserving resize bounded by the given box.
    fn resize_fit(img: DynamicImage, width: Option<u32>, height: Option<u32>) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        match (width, height) {
            (Some(box_width), Some(box_height)) => {
                let (target_width, target_height) = Self::fitted_dimensions(
                    orig_width,
                    orig_height,
                    box_width.max(1),
                    box_height.max(1),
                );
                if (target_width, target_height) == (orig_width, orig_height) {
                    return img;
                }
                let filter =
                    Self::select_filter(orig_width, orig_height, target_width, target_height);
                img.resize_exact(target_width, target_height, filter)
            }
            // With a single bound there is nothing to fit against; scale to it.
            _ => Self::resize_exact(img, width, height),
        }
    }

    /// Fit inside the box and pad the rest with the background color.
    fn letterbox(
        img: DynamicImage,
        width: Option<u32>,
        height: Option<u32>,
        background: &str,
    ) -> DynamicImage {
        let (orig_width, orig_height) = img.dimensions();
        let Some((box_width, box_height)) =
            Self::target_dimensions(orig_width, orig_height, width, height)
        else {
            return img;
        };
        let box_width = box_width.max(1);
        let box_height = box_height.max(1);

        let (scaled_width, scaled_height) =
            Self::fitted_dimensions(orig_width, orig_height, box_width, box_height);
        let scaled = if (scaled_width, scaled_height) != (orig_width, orig_height) {
            let filter = Self::select_filter(orig_width, orig_height, scaled_width, scaled_height);
            img.resize_exact(scaled_width, scaled_height, filter)
        } else {
            img
        };

        let background = parse_background(background);
        let canvas = RgbaImage::from_pixel(box_width, box_height, background);
        let mut canvas = DynamicImage::ImageRgba8(canvas);

        let x_offset = (box_width - scaled_width) / 2;
        let y_offset = (box_height - scaled_height) / 2;
        imageops::overlay(&mut canvas, &scaled, x_offset as i64, y_offset as i64);

        canvas
    }

    /// Encode to JPEG through mozjpeg.
    fn encode_jpeg(img: &DynamicImage, quality: u8) -> EngineResult<Bytes> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp
            .start_compress(Vec::new())
            .map_err(|e| EngineError::Encode(e.to_string()))?;
        comp.write_scanlines(&rgb_img)
            .map_err(|e| EngineError::Encode(e.to_string()))?;
        let jpeg_data = comp
            .finish()
            .map_err(|e| EngineError::Encode(e.to_string()))?;

        Ok(Bytes::from(jpeg_data))
    }

    /// Encode to WebP through libwebp.
    fn encode_webp(img: &DynamicImage, quality: u8) -> EngineResult<Bytes> {
        let rgba_img = img.to_rgba8();
        let (width, height) = rgba_img.dimensions();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder.encode(quality as f32);

        Ok(Bytes::copy_from_slice(&webp_data))
    }

    /// Encode with the `image` crate's own writers (png, gif).
    fn encode_with_image(img: &DynamicImage, format: ImageFormat) -> EngineResult<Bytes> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format)
            .map_err(|e| EngineError::Encode(e.to_string()))?;
        Ok(Bytes::from(buffer))
    }

    fn encode(
        img: &DynamicImage,
        format: SourceFormat,
        quality: Option<u8>,
    ) -> EngineResult<Bytes> {
        match format {
            SourceFormat::Jpeg => {
                Self::encode_jpeg(img, quality.unwrap_or(DEFAULT_JPEG_QUALITY))
            }
            SourceFormat::Webp => Self::encode_webp(img, quality.unwrap_or(DEFAULT_WEBP_QUALITY)),
            SourceFormat::Png => Self::encode_with_image(img, ImageFormat::Png),
            SourceFormat::Gif => Self::encode_with_image(img, ImageFormat::Gif),
        }
    }
}

#[async_trait]
impl TransformEngine for RasterEngine {
    fn probe(&self, blob: &[u8]) -> EngineResult<SourceMetadata> {
        let reader = image::ImageReader::new(Cursor::new(blob))
            .with_guessed_format()
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        let format = match reader.format() {
            Some(ImageFormat::Jpeg) => SourceFormat::Jpeg,
            Some(ImageFormat::Png) => SourceFormat::Png,
            Some(ImageFormat::Gif) => SourceFormat::Gif,
            Some(ImageFormat::WebP) => SourceFormat::Webp,
            Some(other) => {
                return Err(EngineError::UnsupportedFormat(format!("{:?}", other)));
            }
            None => {
                return Err(EngineError::UnsupportedFormat(
                    "unrecognized container".to_string(),
                ));
            }
        };

        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        Ok(SourceMetadata {
            width,
            height,
            format,
            animated: false,
        })
    }

    fn is_animated(&self, blob: &[u8]) -> EngineResult<bool> {
        let decoder = image::codecs::gif::GifDecoder::new(Cursor::new(blob))
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        // Two decoded frames are enough to answer; never walk the whole file.
        let frames = decoder
            .into_frames()
            .take(2)
            .filter(|frame| frame.is_ok())
            .count();
        Ok(frames > 1)
    }

    async fn apply(
        &self,
        blob: &[u8],
        meta: &SourceMetadata,
        ops: &[TransformOp],
    ) -> EngineResult<TransformOutput> {
        let mut img = Self::decode(blob)?;
        let mut format = meta.format;
        let mut quality: Option<u8> = None;

        for op in ops {
            match op {
                TransformOp::Rotate { angle } => img = Self::rotate(img, *angle),
                TransformOp::Negate => img.invert(),
                TransformOp::FlipVertical => img = img.flipv(),
                TransformOp::FlipHorizontal => img = img.fliph(),
                TransformOp::Grayscale => img = img.grayscale(),
                TransformOp::Crop {
                    left,
                    top,
                    width,
                    height,
                } => img = Self::crop(img, *left, *top, *width, *height),
                TransformOp::Resize { width, height } => {
                    img = Self::resize_exact(img, *width, *height)
                }
                TransformOp::ResizeFit { width, height } => {
                    img = Self::resize_fit(img, *width, *height)
                }
                TransformOp::Letterbox {
                    width,
                    height,
                    background,
                } => img = Self::letterbox(img, *width, *height, background),
                TransformOp::EncodeWebp { quality: q } => {
                    format = SourceFormat::Webp;
                    quality = Some(*q);
                }
                TransformOp::EncodeJpeg { quality: q } => {
                    format = SourceFormat::Jpeg;
                    quality = Some(*q);
                }
                TransformOp::ConvertFormat { target } => format = *target,
            }
        }

        let (width, height) = img.dimensions();
        tracing::debug!(
            ops = ops.len(),
            output_format = ?format,
            width,
            height,
            "Applied transform operations"
        );

        let body = Self::encode(&img, format, quality)?;

        Ok(TransformOutput {
            body,
            content_type: format.content_type().to_string(),
        })
    }
}
