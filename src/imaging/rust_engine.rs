//! Image engine built on the `image` crate, with `libwebp` for lossy WebP.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Probe | `ImageReader::with_guessed_format` + `into_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Cover crop | `DynamicImage::crop_imm`, centered |
//! | Contain padding | `imageops::overlay` onto a black canvas |
//! | Encode → JPEG | `JpegEncoder::new_with_quality` |
//! | Encode → PNG | `PngEncoder`, best compression, adaptive filter |
//! | Encode → WebP | `webp::Encoder` (lossy, libwebp) |
//!
//! PNG output is lossless, so the requested quality applies to JPEG and WebP.
//! HEIC input has no decoder and fails at probe/decode time.

use super::calculations::ResizePlan;
use super::engine::{Dimensions, EncodedImage, EngineError, ImageEngine, ImageMetadata};
use super::format::{EncodableFormat, FitMode, format_name};
use super::params::Quality;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;

/// Engine backed by the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustEngine;

impl RustEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Open a reader over `buffer`, failing when no known format signature matches.
fn open(buffer: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, EngineError> {
    let reader = ImageReader::new(Cursor::new(buffer)).with_guessed_format()?;
    if reader.format().is_none() {
        return Err(EngineError::Decode("unrecognized image format".to_string()));
    }
    Ok(reader)
}

fn dimensions_of(image: &DynamicImage) -> Dimensions {
    Dimensions {
        width: image.width(),
        height: image.height(),
    }
}

/// Center-crop `image` down to `canvas`.
fn crop_center(image: DynamicImage, canvas: Dimensions) -> Result<DynamicImage, EngineError> {
    if canvas.width > image.width() || canvas.height > image.height() {
        return Err(EngineError::Resize(format!(
            "crop {}x{} exceeds image {}x{}",
            canvas.width,
            canvas.height,
            image.width(),
            image.height()
        )));
    }
    let x = (image.width() - canvas.width) / 2;
    let y = (image.height() - canvas.height) / 2;
    Ok(image.crop_imm(x, y, canvas.width, canvas.height))
}

/// Center `image` on an opaque black `canvas`.
fn pad_center(image: DynamicImage, canvas: Dimensions) -> Result<DynamicImage, EngineError> {
    if canvas.width < image.width() || canvas.height < image.height() {
        return Err(EngineError::Resize(format!(
            "canvas {}x{} smaller than image {}x{}",
            canvas.width,
            canvas.height,
            image.width(),
            image.height()
        )));
    }
    let mut background = RgbaImage::from_pixel(canvas.width, canvas.height, Rgba([0, 0, 0, 255]));
    let x = (canvas.width - image.width()) / 2;
    let y = (canvas.height - image.height()) / 2;
    image::imageops::overlay(&mut background, &image.to_rgba8(), x as i64, y as i64);
    Ok(DynamicImage::ImageRgba8(background))
}

impl ImageEngine for RustEngine {
    type Image = DynamicImage;

    fn probe(&self, buffer: &[u8]) -> Result<ImageMetadata, EngineError> {
        let reader = open(buffer)?;
        let format = reader.format().map(|f| format_name(f).to_string());
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        Ok(ImageMetadata {
            format,
            width: Some(width),
            height: Some(height),
        })
    }

    fn decode(&self, buffer: &[u8]) -> Result<DynamicImage, EngineError> {
        open(buffer)?
            .decode()
            .map_err(|e| EngineError::Decode(e.to_string()))
    }

    fn dimensions(&self, image: &DynamicImage) -> Dimensions {
        dimensions_of(image)
    }

    fn resize(&self, image: DynamicImage, plan: &ResizePlan) -> Result<DynamicImage, EngineError> {
        let source = dimensions_of(&image);
        if plan.is_noop(source) {
            return Ok(image);
        }

        let scaled = if plan.scaled == source {
            image
        } else {
            image.resize_exact(plan.scaled.width, plan.scaled.height, FilterType::Lanczos3)
        };

        if plan.canvas == plan.scaled {
            return Ok(scaled);
        }
        match plan.fit {
            FitMode::Cover => crop_center(scaled, plan.canvas),
            FitMode::Contain => pad_center(scaled, plan.canvas),
            other => Err(EngineError::Resize(format!(
                "fit mode {other:?} does not change the canvas"
            ))),
        }
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: EncodableFormat,
        quality: Quality,
    ) -> Result<EncodedImage, EngineError> {
        let mut data = Vec::new();
        let written = match format {
            EncodableFormat::Jpeg => {
                // JPEG has no alpha channel
                let encoder = JpegEncoder::new_with_quality(&mut data, quality.value() as u8);
                DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)
            }
            EncodableFormat::Png => {
                let encoder =
                    PngEncoder::new_with_quality(&mut data, CompressionType::Best, PngFilter::Adaptive);
                image.write_with_encoder(encoder)
            }
            EncodableFormat::Webp => {
                let encoded = if image.color().has_alpha() {
                    let rgba = image.to_rgba8();
                    webp::Encoder::from_rgba(&rgba, image.width(), image.height())
                        .encode_simple(false, quality.value() as f32)
                } else {
                    let rgb = image.to_rgb8();
                    webp::Encoder::from_rgb(&rgb, image.width(), image.height())
                        .encode_simple(false, quality.value() as f32)
                };
                let encoded = encoded.map_err(|e| EngineError::Encode {
                    format,
                    message: format!("{e:?}"),
                })?;
                data.extend_from_slice(&encoded);
                Ok(())
            }
        };
        written.map_err(|e| EngineError::Encode {
            format,
            message: e.to_string(),
        })?;

        Ok(EncodedImage {
            data,
            format,
            width: image.width(),
            height: image.height(),
        })
    }
}
