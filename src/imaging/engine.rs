//! Image engine trait and shared types.
//!
//! The [`ImageEngine`] trait is the seam between conversion logic and pixel
//! work. It exposes the five capabilities the converter needs: probe, decode,
//! dimensions, resize, and encode.
//!
//! The production implementation is
//! [`RustEngine`](super::rust_engine::RustEngine), built on the `image` crate.
//! Tests use the recording `MockEngine` in this module.

use super::calculations::ResizePlan;
use super::format::EncodableFormat;
use super::params::Quality;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to resize image: {0}")]
    Resize(String),
    #[error("Failed to encode {format} image: {message}")]
    Encode {
        format: EncodableFormat,
        message: String,
    },
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Result of probing a buffer without decoding pixels.
///
/// Absent fields mean the engine could not determine them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageMetadata {
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Encoded output of a conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: EncodableFormat,
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing engines.
///
/// `Image` is the engine's in-memory handle for a decoded image. Engines are
/// `Sync` so one converter can serve independent invocations on separate
/// threads.
pub trait ImageEngine: Sync {
    type Image;

    /// Read format and dimensions from the buffer header.
    fn probe(&self, buffer: &[u8]) -> Result<ImageMetadata, EngineError>;

    /// Decode the buffer into an image handle.
    fn decode(&self, buffer: &[u8]) -> Result<Self::Image, EngineError>;

    fn dimensions(&self, image: &Self::Image) -> Dimensions;

    /// Execute a resize plan.
    fn resize(&self, image: Self::Image, plan: &ResizePlan) -> Result<Self::Image, EngineError>;

    /// Encode the image. `quality` only applies to lossy codecs.
    fn encode(
        &self,
        image: &Self::Image,
        format: EncodableFormat,
        quality: Quality,
    ) -> Result<EncodedImage, EngineError>;
}
