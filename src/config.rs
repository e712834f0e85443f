//! Converter configuration module.
//!
//! Handles loading, validating, and merging configuration. Settings are
//! layered: stock defaults are overridden by an optional `config.toml`, which
//! is overridden in turn by environment-style `IMAGECONVERTER_*` keys.
//!
//! ```text
//! stock defaults  →  config.toml  →  IMAGECONVERTER_QUALITY=90 ...
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! location = "us-central1"   # Deployment region label
//! img_bucket = ""            # Bucket the trigger listens on
//! target_format = "jpg"      # jpg | jpeg | png | webp | heic
//! quality = 80               # 1-100
//! generate_thumbnail = false
//! thumbnail_size = 200       # 1-9999, bounding box edge in pixels
//! preserve_original = false  # Keep the upload after converting it
//! allowed_formats = ["jpg", "jpeg", "png", "webp", "heic"]
//! ```
//!
//! ## Environment Keys
//!
//! Every key can be set as `IMAGECONVERTER_<KEY>` (key case-insensitive).
//! Lists are comma-separated; booleans accept `true/false/1/0/yes/no`.
//!
//! Unknown keys are rejected in every layer to catch typos early.

use crate::imaging::{ImageFormatToken, MAX_THUMBNAIL_SIZE, Quality};
use crate::naming::file_extension;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Prefix for environment-style configuration keys.
pub const ENV_PREFIX: &str = "IMAGECONVERTER_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Converter configuration.
///
/// All fields have defaults. Config layers need only specify the values they
/// want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Deployment region label.
    pub location: String,
    /// Bucket the upload trigger listens on.
    pub img_bucket: String,
    /// Format every upload is converted to.
    pub target_format: ImageFormatToken,
    /// Encoding quality, 1-100.
    pub quality: u32,
    /// Whether to produce a `_thumb` variant for each upload.
    pub generate_thumbnail: bool,
    /// Thumbnail bounding box edge, 1-9999. Only checked when thumbnails are on.
    pub thumbnail_size: u32,
    /// Keep the original upload after a successful conversion.
    pub preserve_original: bool,
    /// Upload extensions that trigger processing.
    pub allowed_formats: Vec<String>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            location: "us-central1".to_string(),
            img_bucket: String::new(),
            target_format: ImageFormatToken::Jpg,
            quality: 80,
            generate_thumbnail: false,
            thumbnail_size: 200,
            preserve_original: false,
            allowed_formats: ["jpg", "jpeg", "png", "webp", "heic"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl ConverterConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::Validation(
                "quality must be between 1 and 100".into(),
            ));
        }
        if self.generate_thumbnail && !(1..=MAX_THUMBNAIL_SIZE).contains(&self.thumbnail_size) {
            return Err(ConfigError::Validation(format!(
                "thumbnail_size must be between 1 and {MAX_THUMBNAIL_SIZE}"
            )));
        }
        if self.allowed_formats.is_empty() {
            return Err(ConfigError::Validation(
                "allowed_formats must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Trim and lowercase the extension allow-list.
    fn normalize(&mut self) {
        self.allowed_formats = self
            .allowed_formats
            .iter()
            .map(|f| f.trim().to_ascii_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
    }

    pub fn quality(&self) -> Quality {
        Quality::new(self.quality)
    }

    /// The thumbnail bounding size, when thumbnails are enabled.
    pub fn thumbnail_size(&self) -> Option<u32> {
        self.generate_thumbnail.then_some(self.thumbnail_size)
    }

    /// Whether an uploaded object's extension is on the allow-list.
    ///
    /// `jpeg` extensions are checked as `jpg`.
    pub fn is_supported_image(&self, filename: &str) -> bool {
        let ext = file_extension(filename);
        !ext.is_empty() && self.allowed_formats.iter().any(|f| *f == ext)
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ConverterConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ConfigError::Validation(format!(
            "{ENV_PREFIX}{} must be a boolean, got {value:?}",
            key.to_ascii_uppercase()
        ))),
    }
}

fn parse_integer(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::Validation(format!(
            "{ENV_PREFIX}{} must be an integer, got {value:?}",
            key.to_ascii_uppercase()
        ))
    })
}

/// Build a TOML overlay from environment-style key/value pairs.
///
/// Only keys starting with [`ENV_PREFIX`] are considered. Values are coerced
/// to the type each key expects. Returns `Ok(None)` when no key matched.
pub fn env_overlay<I, K, V>(vars: I) -> Result<Option<toml::Value>, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut table = toml::map::Map::new();

    for (key, value) in vars {
        let Some(key) = key.as_ref().strip_prefix(ENV_PREFIX) else {
            continue;
        };
        let key = key.to_ascii_lowercase();
        let value = value.as_ref();

        let parsed = match key.as_str() {
            "location" | "img_bucket" | "target_format" => {
                toml::Value::String(value.trim().to_string())
            }
            "quality" | "thumbnail_size" => toml::Value::Integer(parse_integer(&key, value)?),
            "generate_thumbnail" | "preserve_original" => {
                toml::Value::Boolean(parse_bool(&key, value)?)
            }
            "allowed_formats" => toml::Value::Array(
                value
                    .split(',')
                    .map(|f| toml::Value::String(f.trim().to_string()))
                    .collect(),
            ),
            _ => {
                return Err(ConfigError::Validation(format!(
                    "unknown setting {ENV_PREFIX}{}",
                    key.to_ascii_uppercase()
                )));
            }
        };
        table.insert(key, parsed);
    }

    Ok((!table.is_empty()).then_some(toml::Value::Table(table)))
}

/// Merge overlays onto a base value in order, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlays: impl IntoIterator<Item = toml::Value>,
) -> Result<ConverterConfig, ConfigError> {
    let merged = overlays.into_iter().fold(base, merge_toml);
    let mut config: ConverterConfig = merged.try_into()?;
    config.normalize();
    config.validate()?;
    Ok(config)
}

/// Load the full configuration stack.
///
/// `path` is an optional `config.toml` (missing files are skipped); `vars` is
/// the environment, usually `std::env::vars()`.
pub fn load_config<I, K, V>(path: Option<&Path>, vars: I) -> Result<ConverterConfig, ConfigError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let file_layer = match path {
        Some(path) => load_raw_config(path)?,
        None => None,
    };
    let env_layer = env_overlay(vars)?;
    resolve_config(
        stock_defaults_value(),
        file_layer.into_iter().chain(env_layer),
    )
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Upload Converter Configuration
# ==============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Every key can also be set through the environment as IMAGECONVERTER_<KEY>,
# which overrides this file. Unknown keys will cause an error.

# Deployment region label.
location = "us-central1"

# Bucket the upload trigger listens on.
img_bucket = ""

# Format every upload is converted to: jpg, jpeg, png, webp or heic.
# heic is written as JPEG (no HEIC encoder is available).
target_format = "jpg"

# Encoding quality for jpg and webp (1 = smallest, 100 = best). png ignores it.
quality = 80

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
# Produce a <name>_thumb.<format> variant next to each converted upload.
generate_thumbnail = false

# Edge of the square bounding box thumbnails are fitted into (1-9999).
thumbnail_size = 200

# ---------------------------------------------------------------------------
# Uploads
# ---------------------------------------------------------------------------
# Keep the original object after converting it.
preserve_original = false

# Extensions that trigger processing. "jpeg" files are matched as "jpg".
allowed_formats = ["jpg", "jpeg", "png", "webp", "heic"]
"##
}
