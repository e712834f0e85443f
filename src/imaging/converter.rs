//! Conversion decision and transform entry points.
//!
//! These functions combine calculations with engine execution. Every
//! transform returns a [`ConversionResult`]: engine failures are values, not
//! errors, so one bad upload never unwinds its caller.
//!
//! ```text
//! decode ──▶ (resize) ──▶ encode ──▶ ConversionResult::Success
//!    │           │           │
//!    └───────────┴───────────┴─────▶ ConversionResult::Failure
//! ```

use super::calculations::{DimensionError, plan_resize, plan_thumbnail};
use super::engine::{EncodedImage, EngineError, ImageEngine, ImageMetadata};
use super::format::{EncodableFormat, FitMode, ImageFormatToken};
use super::params::{ConversionOptions, Quality, ThumbnailOptions};
use crate::naming::generate_output_path;
use serde::Serialize;
use std::num::NonZeroU32;
use thiserror::Error;
use tracing::{Span, debug, error, info};

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Dimensions(#[from] DimensionError),
}

/// Metadata describing a successfully encoded output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputMetadata {
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub size_in_bytes: usize,
}

impl From<&EncodedImage> for OutputMetadata {
    fn from(encoded: &EncodedImage) -> Self {
        Self {
            format: encoded.format.as_str().to_string(),
            width: encoded.width,
            height: encoded.height,
            size_in_bytes: encoded.data.len(),
        }
    }
}

/// Outcome of a transform: success with output metadata, or the failure.
#[derive(Debug)]
pub enum ConversionResult {
    Success {
        metadata: OutputMetadata,
        /// Where the caller should store the output. Nothing is written here.
        output_path: String,
        data: Vec<u8>,
    },
    Failure {
        error: ConvertError,
    },
}

impl ConversionResult {
    fn from_encoded(encoded: EncodedImage, output_path: String) -> Self {
        ConversionResult::Success {
            metadata: OutputMetadata::from(&encoded),
            output_path,
            data: encoded.data,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ConversionResult::Success { .. })
    }

    pub fn metadata(&self) -> Option<&OutputMetadata> {
        match self {
            ConversionResult::Success { metadata, .. } => Some(metadata),
            ConversionResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ConvertError> {
        match self {
            ConversionResult::Success { .. } => None,
            ConversionResult::Failure { error } => Some(error),
        }
    }

    /// Output path for a success, empty for a failure.
    pub fn output_path(&self) -> &str {
        match self {
            ConversionResult::Success { output_path, .. } => output_path,
            ConversionResult::Failure { .. } => "",
        }
    }

    /// Encoded bytes for a success.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            ConversionResult::Success { data, .. } => Some(data),
            ConversionResult::Failure { .. } => None,
        }
    }
}

/// Decide whether `buffer` has to be re-encoded to reach `target`.
///
/// Unreadable buffers and JPEG targets always need work: JPEG quality cannot
/// be recovered from metadata, so a JPEG source is never assumed to already
/// match the requested quality. Probe failures are swallowed.
pub fn needs_conversion(
    engine: &impl ImageEngine,
    buffer: &[u8],
    target: ImageFormatToken,
    quality: Quality,
) -> bool {
    let current = match engine.probe(buffer) {
        Ok(ImageMetadata {
            format: Some(format),
            ..
        }) => format,
        Ok(_) => {
            debug!(%target, "probe returned no format, assuming conversion is needed");
            return true;
        }
        Err(error) => {
            debug!(%target, %error, "probe failed, assuming conversion is needed");
            return true;
        }
    };

    let normalized = target.encodable();
    if current != normalized.as_str() {
        return true;
    }

    debug!(
        format = %current,
        quality = quality.value(),
        "source already in target format"
    );
    // JPEG quality is not recoverable from metadata; always re-encode
    normalized == EncodableFormat::Jpeg
}

/// Transform engine: runs conversions and thumbnails against an [`ImageEngine`].
///
/// Log events are emitted under the span given at construction, so callers
/// decide how conversions are attributed without any global logger state.
pub struct Converter<E> {
    engine: E,
    span: Span,
}

impl<E: ImageEngine> Converter<E> {
    pub fn new(engine: E) -> Self {
        Self::with_span(engine, tracing::info_span!("converter"))
    }

    pub fn with_span(engine: E, span: Span) -> Self {
        Self { engine, span }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// See [`needs_conversion`].
    pub fn needs_conversion(&self, buffer: &[u8], target: ImageFormatToken, quality: Quality) -> bool {
        let _guard = self.span.enter();
        needs_conversion(&self.engine, buffer, target, quality)
    }

    /// Probe the buffer, propagating decode failures.
    pub fn get_image_metadata(&self, buffer: &[u8]) -> Result<ImageMetadata, EngineError> {
        self.engine.probe(buffer)
    }

    /// Convert `buffer` to `options.format` at `options.quality`, resizing
    /// first when a width or height is given.
    pub fn convert(
        &self,
        buffer: &[u8],
        options: &ConversionOptions,
        original_filename: &str,
    ) -> ConversionResult {
        info!(
            parent: &self.span,
            filename = original_filename,
            format = %options.format,
            quality = options.quality.value(),
            width = options.width.map(NonZeroU32::get),
            height = options.height.map(NonZeroU32::get),
            "starting image conversion"
        );

        match self.try_convert(buffer, options) {
            Ok(encoded) => {
                let output_path = generate_output_path(original_filename, options.format, false);
                self.log_success("image converted", original_filename, &encoded);
                ConversionResult::from_encoded(encoded, output_path)
            }
            Err(error) => {
                error!(
                    parent: &self.span,
                    filename = original_filename,
                    format = %options.format,
                    %error,
                    "error converting image"
                );
                ConversionResult::Failure { error }
            }
        }
    }

    fn try_convert(
        &self,
        buffer: &[u8],
        options: &ConversionOptions,
    ) -> Result<EncodedImage, ConvertError> {
        let mut image = self.engine.decode(buffer)?;

        if options.resizes() {
            let source = self.engine.dimensions(&image);
            let plan = plan_resize(
                source,
                options.width.map(NonZeroU32::get),
                options.height.map(NonZeroU32::get),
                options.fit.unwrap_or_default(),
            );
            if !plan.is_noop(source) {
                image = self.engine.resize(image, &plan)?;
            }
        }

        Ok(self
            .engine
            .encode(&image, options.format.encodable(), options.quality)?)
    }

    /// Produce a thumbnail that fits in an `options.size` square.
    pub fn generate_thumbnail(
        &self,
        buffer: &[u8],
        options: &ThumbnailOptions,
        original_filename: &str,
    ) -> ConversionResult {
        info!(
            parent: &self.span,
            filename = original_filename,
            size = options.size,
            format = %options.format,
            quality = options.quality.value(),
            "generating thumbnail"
        );

        match self.try_thumbnail(buffer, options) {
            Ok(encoded) => {
                let output_path = generate_output_path(original_filename, options.format, true);
                self.log_success("thumbnail generated", original_filename, &encoded);
                ConversionResult::from_encoded(encoded, output_path)
            }
            Err(error) => {
                error!(
                    parent: &self.span,
                    filename = original_filename,
                    size = options.size,
                    %error,
                    "error generating thumbnail"
                );
                ConversionResult::Failure { error }
            }
        }
    }

    fn try_thumbnail(
        &self,
        buffer: &[u8],
        options: &ThumbnailOptions,
    ) -> Result<EncodedImage, ConvertError> {
        let image = self.engine.decode(buffer)?;
        let source = self.engine.dimensions(&image);
        let (width, height) = plan_thumbnail(source.width, source.height, options.size)?;

        let plan = plan_resize(
            source,
            Some(width),
            Some(height),
            FitMode::Inside,
        );
        let image = if plan.is_noop(source) {
            image
        } else {
            self.engine.resize(image, &plan)?
        };

        Ok(self
            .engine
            .encode(&image, options.format.encodable(), options.quality)?)
    }

    fn log_success(&self, message: &str, original_filename: &str, encoded: &EncodedImage) {
        info!(
            parent: &self.span,
            filename = original_filename,
            format = %encoded.format,
            width = encoded.width,
            height = encoded.height,
            bytes = encoded.data.len(),
            "{message}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::RustEngine;
    use crate::imaging::engine::tests::{MockEngine, RecordedOp};
    use crate::test_helpers::{jpeg_bytes, png_bytes};

    const GARBAGE: &[u8] = b"invalid image data";

    // =========================================================================
    // needs_conversion
    // =========================================================================

    #[test]
    fn needs_conversion_when_format_differs() {
        let engine = MockEngine::with_image("jpeg", 100, 100);
        assert!(needs_conversion(
            &engine,
            b"",
            ImageFormatToken::Png,
            Quality::new(80)
        ));
    }

    #[test]
    fn needs_conversion_always_for_jpeg_targets() {
        let engine = MockEngine::with_image("jpeg", 100, 100);
        for target in [ImageFormatToken::Jpeg, ImageFormatToken::Jpg] {
            for quality in [1, 60, 100] {
                assert!(needs_conversion(&engine, b"", target, Quality::new(quality)));
            }
        }
    }

    #[test]
    fn no_conversion_when_png_is_already_png() {
        let engine = MockEngine::with_image("png", 100, 100);
        assert!(!needs_conversion(
            &engine,
            b"",
            ImageFormatToken::Png,
            Quality::new(80)
        ));
    }

    #[test]
    fn no_conversion_when_webp_is_already_webp() {
        let engine = MockEngine::with_image("webp", 100, 100);
        assert!(!needs_conversion(
            &engine,
            b"",
            ImageFormatToken::Webp,
            Quality::new(80)
        ));
    }

    #[test]
    fn heic_target_compares_against_jpeg() {
        let engine = MockEngine::with_image("png", 100, 100);
        assert!(needs_conversion(
            &engine,
            b"",
            ImageFormatToken::Heic,
            Quality::new(80)
        ));
    }

    #[test]
    fn needs_conversion_when_probe_has_no_format() {
        let engine = MockEngine::with_metadata(ImageMetadata {
            format: None,
            width: Some(10),
            height: Some(10),
        });
        assert!(needs_conversion(
            &engine,
            b"",
            ImageFormatToken::Png,
            Quality::new(80)
        ));
    }

    #[test]
    fn needs_conversion_when_probe_fails() {
        let engine = RustEngine::new();
        for target in ImageFormatToken::ALL {
            assert!(needs_conversion(&engine, GARBAGE, target, Quality::new(80)));
        }
    }

    #[test]
    fn real_png_source_with_png_target_is_left_alone() {
        let engine = RustEngine::new();
        let png = png_bytes(32, 32);
        assert!(!needs_conversion(
            &engine,
            &png,
            ImageFormatToken::Png,
            Quality::new(80)
        ));
        assert!(needs_conversion(
            &engine,
            &png,
            ImageFormatToken::Webp,
            Quality::new(80)
        ));
    }

    // =========================================================================
    // convert
    // =========================================================================

    #[test]
    fn convert_jpeg_to_png() {
        let converter = Converter::new(RustEngine::new());
        let options = ConversionOptions::new(ImageFormatToken::Png, Quality::new(80));
        let result = converter.convert(&jpeg_bytes(100, 100), &options, "test.jpg");

        assert!(result.is_success());
        let metadata = result.metadata().unwrap();
        assert_eq!(metadata.format, "png");
        assert_eq!((metadata.width, metadata.height), (100, 100));
        assert_eq!(metadata.size_in_bytes, result.data().unwrap().len());
        assert_eq!(result.output_path(), "test.png");
        assert!(result.error().is_none());
    }

    #[test]
    fn convert_with_resize_box() {
        let converter = Converter::new(RustEngine::new());
        let options = ConversionOptions::new(ImageFormatToken::Jpg, Quality::new(80))
            .with_size(Some(50), Some(50));
        let result = converter.convert(&jpeg_bytes(100, 100), &options, "test.jpg");

        let metadata = result.metadata().unwrap();
        assert_eq!((metadata.width, metadata.height), (50, 50));
        assert_eq!(metadata.format, "jpeg");
    }

    #[test]
    fn convert_with_cover_fit() {
        let converter = Converter::new(RustEngine::new());
        let options = ConversionOptions::new(ImageFormatToken::Jpg, Quality::new(80))
            .with_size(Some(50), Some(50))
            .with_fit(FitMode::Cover);
        let result = converter.convert(&jpeg_bytes(200, 100), &options, "test.jpg");

        let metadata = result.metadata().unwrap();
        assert_eq!((metadata.width, metadata.height), (50, 50));
    }

    #[test]
    fn convert_never_enlarges() {
        let converter = Converter::new(MockEngine::with_image("jpeg", 40, 30));
        let options = ConversionOptions::new(ImageFormatToken::Png, Quality::new(80))
            .with_size(Some(400), Some(300));
        let result = converter.convert(b"", &options, "small.jpg");

        let metadata = result.metadata().unwrap();
        assert_eq!((metadata.width, metadata.height), (40, 30));
        assert!(
            !converter
                .engine()
                .get_operations()
                .iter()
                .any(|op| matches!(op, RecordedOp::Resize { .. }))
        );
    }

    #[test]
    fn convert_heic_target_encodes_jpeg() {
        let converter = Converter::new(RustEngine::new());
        let options = ConversionOptions::new(ImageFormatToken::Heic, Quality::new(80));
        let result = converter.convert(&jpeg_bytes(100, 100), &options, "test.heic");

        assert_eq!(result.metadata().unwrap().format, "jpeg");
        assert_eq!(result.output_path(), "test.heic");
    }

    #[test]
    fn convert_garbage_is_a_failure_value() {
        let converter = Converter::new(RustEngine::new());
        let options = ConversionOptions::new(ImageFormatToken::Jpg, Quality::new(80));
        let result = converter.convert(GARBAGE, &options, "test.jpg");

        assert!(!result.is_success());
        assert!(matches!(
            result.error(),
            Some(ConvertError::Engine(EngineError::Decode(_)))
        ));
        assert_eq!(result.output_path(), "");
        assert!(result.metadata().is_none());
        assert!(result.data().is_none());
    }

    #[test]
    fn convert_encode_failure_is_a_failure_value() {
        let converter = Converter::new(MockEngine::with_image("png", 10, 10).failing_encode());
        let options = ConversionOptions::new(ImageFormatToken::Webp, Quality::new(80));
        let result = converter.convert(b"", &options, "a.png");

        assert!(matches!(
            result.error(),
            Some(ConvertError::Engine(EngineError::Encode { .. }))
        ));
        assert_eq!(result.output_path(), "");
    }

    #[test]
    fn convert_passes_quality_and_format_to_engine() {
        let converter = Converter::new(MockEngine::with_image("png", 10, 10));
        let options = ConversionOptions::new(ImageFormatToken::Jpg, Quality::new(65));
        converter.convert(b"", &options, "a.png");

        assert_eq!(
            converter.engine().get_operations(),
            vec![
                RecordedOp::Decode,
                RecordedOp::Encode {
                    format: EncodableFormat::Jpeg,
                    quality: 65
                }
            ]
        );
    }

    #[test]
    fn convert_is_idempotent() {
        let converter = Converter::new(RustEngine::new());
        let source = jpeg_bytes(120, 80);
        let options = ConversionOptions::new(ImageFormatToken::Webp, Quality::new(75))
            .with_size(Some(60), None);

        let first = converter.convert(&source, &options, "x.jpg");
        let second = converter.convert(&source, &options, "x.jpg");
        assert_eq!(first.metadata(), second.metadata());
        assert_eq!(first.data(), second.data());
    }

    // =========================================================================
    // generate_thumbnail
    // =========================================================================

    fn thumb_options(size: u32) -> ThumbnailOptions {
        ThumbnailOptions {
            size,
            format: ImageFormatToken::Jpg,
            quality: Quality::new(80),
        }
    }

    #[test]
    fn thumbnail_fits_box() {
        let converter = Converter::new(RustEngine::new());
        let result = converter.generate_thumbnail(&jpeg_bytes(100, 100), &thumb_options(50), "test.jpg");

        let metadata = result.metadata().unwrap();
        assert!(metadata.width <= 50 && metadata.height <= 50);
        assert_eq!(result.output_path(), "test_thumb.jpg");
    }

    #[test]
    fn thumbnail_keeps_landscape_aspect() {
        let converter = Converter::new(RustEngine::new());
        let result = converter.generate_thumbnail(&jpeg_bytes(200, 100), &thumb_options(50), "test.jpg");

        let metadata = result.metadata().unwrap();
        assert_eq!((metadata.width, metadata.height), (50, 25));
    }

    #[test]
    fn thumbnail_keeps_portrait_aspect() {
        let converter = Converter::new(RustEngine::new());
        let result = converter.generate_thumbnail(&jpeg_bytes(100, 200), &thumb_options(50), "test.jpg");

        let metadata = result.metadata().unwrap();
        assert_eq!((metadata.width, metadata.height), (25, 50));
    }

    #[test]
    fn thumbnail_of_small_source_is_not_enlarged() {
        let converter = Converter::new(MockEngine::with_image("png", 20, 10));
        let result = converter.generate_thumbnail(b"", &thumb_options(200), "tiny.png");

        let metadata = result.metadata().unwrap();
        assert_eq!((metadata.width, metadata.height), (20, 10));
    }

    #[test]
    fn thumbnail_resizes_inside() {
        let converter = Converter::new(MockEngine::with_image("png", 400, 300));
        converter.generate_thumbnail(b"", &thumb_options(100), "photo.png");

        let ops = converter.engine().get_operations();
        assert!(ops.contains(&RecordedOp::Resize {
            fit: FitMode::Inside,
            width: 100,
            height: 75
        }));
    }

    #[test]
    fn thumbnail_of_zero_height_image_fails() {
        let converter = Converter::new(MockEngine::with_image("png", 100, 0));
        let result = converter.generate_thumbnail(b"", &thumb_options(50), "flat.png");

        assert!(matches!(
            result.error(),
            Some(ConvertError::Dimensions(DimensionError::ZeroDimension { .. }))
        ));
        assert_eq!(result.output_path(), "");
    }

    #[test]
    fn thumbnail_of_garbage_fails() {
        let converter = Converter::new(RustEngine::new());
        let result = converter.generate_thumbnail(GARBAGE, &thumb_options(50), "test.jpg");

        assert!(!result.is_success());
        assert!(result.error().is_some());
        assert_eq!(result.output_path(), "");
    }

    // =========================================================================
    // get_image_metadata
    // =========================================================================

    #[test]
    fn metadata_of_real_jpeg() {
        let converter = Converter::new(RustEngine::new());
        let metadata = converter.get_image_metadata(&jpeg_bytes(100, 100)).unwrap();
        assert_eq!(metadata.width, Some(100));
        assert_eq!(metadata.height, Some(100));
        assert_eq!(metadata.format.as_deref(), Some("jpeg"));
    }

    #[test]
    fn metadata_of_garbage_propagates_error() {
        let converter = Converter::new(RustEngine::new());
        assert!(converter.get_image_metadata(GARBAGE).is_err());
    }
}
