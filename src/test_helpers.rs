//! Shared test utilities for the upload-converter test suite.
//!
//! Provides synthetic image buffers in every format the engine reads, plus a
//! throwaway filesystem bucket to run the pipeline against.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let (_tmp, bucket) = temp_bucket();
//! put(&bucket, "uploads/photo.png", &png_bytes(64, 48));
//! ```

use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{DynamicImage, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use tempfile::TempDir;

use crate::pipeline::{FsBucket, ObjectStore};

// =========================================================================
// Synthetic images
// =========================================================================

/// Gradient so encoders have real content to compress.
fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    })
}

/// A baseline JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(gradient(width, height))
        .write_with_encoder(image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 90))
        .unwrap();
    buf
}

/// An RGB PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(
            gradient(width, height).as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
    buf
}

/// An RGBA PNG with a half-transparent alpha channel.
pub fn rgba_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 128, 128]));
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(image.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

/// A lossless WebP of the given size.
pub fn webp_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    WebPEncoder::new_lossless(&mut buf)
        .write_image(
            gradient(width, height).as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
    buf
}

// =========================================================================
// Buckets
// =========================================================================

/// An empty bucket rooted in a fresh temp directory.
///
/// Keep the `TempDir` alive for as long as the bucket is used.
pub fn temp_bucket() -> (TempDir, FsBucket) {
    let tmp = TempDir::new().unwrap();
    let bucket = FsBucket::new(tmp.path()).unwrap();
    (tmp, bucket)
}

/// Store `data` under `name` with no custom metadata.
pub fn put(bucket: &FsBucket, name: &str, data: &[u8]) {
    bucket
        .upload(name, data, &Default::default())
        .unwrap_or_else(|e| panic!("failed to store '{name}': {e}"));
}

/// Sorted object names currently in the bucket.
pub fn object_names(bucket: &FsBucket) -> Vec<String> {
    let mut names = bucket.objects().unwrap();
    names.sort();
    names
}
