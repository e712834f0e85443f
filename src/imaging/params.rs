//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They are the interface
//! between callers (the upload pipeline, the CLI, tests) and the
//! [`Converter`](super::converter::Converter), which turns them into engine
//! calls.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`ConversionOptions`]: Target format and quality, plus an optional resize box and fit mode.
//! - [`ThumbnailOptions`]: Bounding-box edge with the target format and quality.

use super::format::{FitMode, ImageFormatToken};
use serde::Serialize;
use std::num::NonZeroU32;

/// Largest accepted thumbnail bounding edge.
pub const MAX_THUMBNAIL_SIZE: u32 = 9999;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Options for a full conversion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionOptions {
    pub format: ImageFormatToken,
    pub quality: Quality,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<NonZeroU32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<NonZeroU32>,
    /// Defaults to [`FitMode::Inside`] when a resize box is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitMode>,
}

impl ConversionOptions {
    /// Format change only, no resize.
    pub fn new(format: ImageFormatToken, quality: Quality) -> Self {
        Self {
            format,
            quality,
            width: None,
            height: None,
            fit: None,
        }
    }

    pub fn with_size(mut self, width: Option<u32>, height: Option<u32>) -> Self {
        self.width = width.and_then(NonZeroU32::new);
        self.height = height.and_then(NonZeroU32::new);
        self
    }

    pub fn with_fit(mut self, fit: FitMode) -> Self {
        self.fit = Some(fit);
        self
    }

    pub fn resizes(&self) -> bool {
        self.width.is_some() || self.height.is_some()
    }
}

/// Options for thumbnail generation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThumbnailOptions {
    /// Edge of the square bounding box, in pixels.
    pub size: u32,
    pub format: ImageFormatToken,
    pub quality: Quality,
}
