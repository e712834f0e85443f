//! Format tokens and the encodable formats they resolve to.
//!
//! Users (config files, environment keys, CLI flags) speak in
//! [`ImageFormatToken`]s: `jpg`, `jpeg`, `png`, `webp`, `heic`. The encoder
//! only knows three codecs, the [`EncodableFormat`]s. The mapping is total:
//!
//! | Token | Encodable | MIME |
//! |---|---|---|
//! | `jpg` | jpeg | `image/jpeg` |
//! | `jpeg` | jpeg | `image/jpeg` |
//! | `png` | png | `image/png` |
//! | `webp` | webp | `image/webp` |
//! | `heic` | jpeg | `image/heic` |
//!
//! There is no HEIC encoder, so `heic` always lands on JPEG. Unknown tokens
//! never reach the resolver: [`ImageFormatToken::from_str`] rejects them.

use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("unknown image format: {0}")]
    UnknownToken(String),
    #[error("unknown fit mode: {0}")]
    UnknownFitMode(String),
}

/// MIME type reported for anything that is not a known format token.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// User-facing format identifier, including aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ImageFormatToken {
    Jpg,
    Jpeg,
    Png,
    Webp,
    Heic,
}

impl ImageFormatToken {
    pub const ALL: [ImageFormatToken; 5] = [
        ImageFormatToken::Jpg,
        ImageFormatToken::Jpeg,
        ImageFormatToken::Png,
        ImageFormatToken::Webp,
        ImageFormatToken::Heic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormatToken::Jpg => "jpg",
            ImageFormatToken::Jpeg => "jpeg",
            ImageFormatToken::Png => "png",
            ImageFormatToken::Webp => "webp",
            ImageFormatToken::Heic => "heic",
        }
    }

    /// The codec this token is written with.
    pub fn encodable(self) -> EncodableFormat {
        match self {
            ImageFormatToken::Jpg | ImageFormatToken::Jpeg | ImageFormatToken::Heic => {
                EncodableFormat::Jpeg
            }
            ImageFormatToken::Png => EncodableFormat::Png,
            ImageFormatToken::Webp => EncodableFormat::Webp,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormatToken::Jpg | ImageFormatToken::Jpeg => "image/jpeg",
            ImageFormatToken::Png => "image/png",
            ImageFormatToken::Webp => "image/webp",
            ImageFormatToken::Heic => "image/heic",
        }
    }
}

impl FromStr for ImageFormatToken {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|token| token.as_str() == normalized)
            .ok_or_else(|| FormatError::UnknownToken(s.to_string()))
    }
}

impl TryFrom<String> for ImageFormatToken {
    type Error = FormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ImageFormatToken> for String {
    fn from(token: ImageFormatToken) -> Self {
        token.as_str().to_string()
    }
}

impl fmt::Display for ImageFormatToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// MIME type for a format name, falling back to `application/octet-stream`.
pub fn mime_type(name: &str) -> &'static str {
    name.parse::<ImageFormatToken>()
        .map(ImageFormatToken::mime_type)
        .unwrap_or(OCTET_STREAM)
}

/// A codec the encoder can actually produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodableFormat {
    Jpeg,
    Png,
    Webp,
}

impl EncodableFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            EncodableFormat::Jpeg => "jpeg",
            EncodableFormat::Png => "png",
            EncodableFormat::Webp => "webp",
        }
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            EncodableFormat::Jpeg => ImageFormat::Jpeg,
            EncodableFormat::Png => ImageFormat::Png,
            EncodableFormat::Webp => ImageFormat::WebP,
        }
    }

    pub fn from_image_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(EncodableFormat::Jpeg),
            ImageFormat::Png => Some(EncodableFormat::Png),
            ImageFormat::WebP => Some(EncodableFormat::Webp),
            _ => None,
        }
    }
}

impl fmt::Display for EncodableFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name used in probe results for a decoded container format.
///
/// Matches [`EncodableFormat::as_str`] for the three encodable codecs so the
/// conversion decision can compare names directly.
pub fn format_name(format: ImageFormat) -> &'static str {
    match EncodableFormat::from_image_format(format) {
        Some(encodable) => encodable.as_str(),
        None => match format {
            ImageFormat::Tiff => "tiff",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            other => other.extensions_str().first().copied().unwrap_or("unknown"),
        },
    }
}

/// How a conversion maps source dimensions onto a requested width/height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Scale and crop to cover the box exactly.
    Cover,
    /// Scale to fit inside the box, then pad to the box.
    Contain,
    /// Stretch to the box, ignoring aspect ratio.
    Fill,
    /// Scale to fit inside the box.
    #[default]
    Inside,
    /// Scale so the box fits inside the image.
    Outside,
}

impl FromStr for FitMode {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cover" => Ok(FitMode::Cover),
            "contain" => Ok(FitMode::Contain),
            "fill" => Ok(FitMode::Fill),
            "inside" => Ok(FitMode::Inside),
            "outside" => Ok(FitMode::Outside),
            _ => Err(FormatError::UnknownFitMode(s.to_string())),
        }
    }
}
