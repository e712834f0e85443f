//! # Upload Converter
//!
//! Converts images uploaded to a storage bucket into one configured format
//! (JPEG, PNG or WebP), optionally writing a bounded thumbnail next to each
//! converted image.
//!
//! # Architecture
//!
//! ```text
//! finalize event ──▶ pipeline::handle_upload
//!                      ├─ config: allow-list, target format, quality
//!                      ├─ imaging::Converter
//!                      │    ├─ needs_conversion   (probe, compare formats)
//!                      │    ├─ convert            (decode → resize → encode)
//!                      │    └─ generate_thumbnail (plan_thumbnail → resize → encode)
//!                      └─ ObjectStore: download, upload outputs, delete original
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Format resolution, dimension planning, conversion decision, transform engine |
//! | [`naming`] | Output object names (`photo.jpg` → `photo_thumb.webp`) and extension parsing |
//! | [`config`] | Layered configuration: stock defaults, `config.toml`, `IMAGECONVERTER_*` keys |
//! | [`pipeline`] | Upload events, object storage, single-upload orchestration |
//! | [`output`] | CLI output formatting of pipeline results |
//!
//! # Design Decisions
//!
//! ## Failures Are Values
//!
//! [`imaging::Converter::convert`] and
//! [`imaging::Converter::generate_thumbnail`] return a
//! [`imaging::ConversionResult`] instead of `Result`: a corrupt upload is an
//! expected input, not an exceptional one. The pipeline records the failure
//! and keeps the original object.
//!
//! ## Imaging Stack
//!
//! Decoding, Lanczos3 resampling and JPEG/PNG encoding go through the `image`
//! crate. WebP is encoded lossily by `libwebp` (via the `webp` crate, built
//! from source) so the quality setting applies to it. HEIC has no encoder, so a `heic` target is written as JPEG under a `.heic` name.
//!
//! ## Never Enlarge
//!
//! Resizes and thumbnails only ever scale down. A thumbnail of an image
//! smaller than the bounding box keeps the original pixel size.
//!
//! ## Loop Guard
//!
//! Outputs land in the bucket that triggers the pipeline. Every output is
//! tagged with `converted=true` or `thumbnail=true` metadata and those objects
//! are skipped on arrival.

pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_helpers;
