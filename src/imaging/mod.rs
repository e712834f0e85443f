//! Image conversion core.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Probe** | `image::ImageReader` header sniffing |
//! | **Resize** | Lanczos3 via `DynamicImage::resize_exact` |
//! | **Encode** | `image` JPEG / PNG encoders, `webp` lossy encoder |
//!
//! The module is split into:
//! - **Format**: Token parsing, token → encodable format, MIME types
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing conversions and thumbnails
//! - **Engine**: [`ImageEngine`] trait + [`RustEngine`]
//! - **Converter**: Conversion decision and the [`Converter`] entry points

mod calculations;
pub mod converter;
pub mod engine;
pub mod format;
mod params;
pub mod rust_engine;

pub use calculations::{DimensionError, ResizePlan, plan_resize, plan_thumbnail};
pub use converter::{ConversionResult, ConvertError, Converter, OutputMetadata, needs_conversion};
pub use engine::{Dimensions, EncodedImage, EngineError, ImageEngine, ImageMetadata};
pub use format::{EncodableFormat, FitMode, FormatError, ImageFormatToken, mime_type};
pub use params::{ConversionOptions, MAX_THUMBNAIL_SIZE, Quality, ThumbnailOptions};
pub use rust_engine::RustEngine;
