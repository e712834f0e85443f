//! Upload pipeline: from a storage finalize event to stored outputs.
//!
//! For each upload the pipeline decides whether the object is one of its own
//! outputs, whether its extension is allowed, and then runs the conversion and
//! thumbnail steps against an [`ObjectStore`].
//!
//! ```text
//! UploadEvent
//!   ├─ metadata converted/thumbnail = "true"  → Skipped (AlreadyProcessed)
//!   ├─ extension not allowed                  → Skipped (UnsupportedFormat)
//!   └─ download
//!        ├─ needs_conversion → convert → upload <name>.<fmt> → delete original
//!        └─ generate_thumbnail           → upload <name>_thumb.<fmt>
//! ```
//!
//! ## Local buckets
//!
//! [`FsBucket`] maps a bucket onto a directory. Object names are relative
//! paths; custom metadata lives in a `<name>.meta.json` sidecar next to the
//! object:
//!
//! ```text
//! bucket/
//! ├── uploads/photo.jpg
//! ├── uploads/photo_thumb.jpg
//! └── uploads/photo_thumb.jpg.meta.json   # {"contentType": ..., "metadata": {"thumbnail": "true", ...}}
//! ```

use crate::config::{ConfigError, ConverterConfig};
use crate::imaging::{
    ConversionOptions, ConversionResult, Converter, ImageEngine, OutputMetadata, ThumbnailOptions,
    mime_type,
};
use crate::naming::file_extension;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, info_span};

/// Suffix of the sidecar file holding an object's attributes.
pub const META_SUFFIX: &str = ".meta.json";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Object not found: {0}")]
    ObjectNotFound(String),
    #[error("Invalid object name: {0:?}")]
    InvalidObjectName(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

// ============================================================================
// Events and attributes
// ============================================================================

/// A storage finalize event: one object was written to a bucket.
///
/// Deserializes from the JSON shape storage triggers deliver. Missing fields
/// fall back to an empty name, `application/octet-stream`, size 0 and no
/// metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadEvent {
    #[serde(default, deserialize_with = "null_as_default")]
    pub bucket: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(
        default = "default_content_type",
        deserialize_with = "content_type_or_default"
    )]
    pub content_type: String,
    #[serde(default, deserialize_with = "size_from_string_or_number")]
    pub size: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: BTreeMap<String, String>,
}

impl UploadEvent {
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether the object was written by this pipeline.
    ///
    /// Outputs are stored in the same bucket that triggers the pipeline, so
    /// without this check every output would be converted again.
    pub fn is_pipeline_output(&self) -> bool {
        ["converted", "thumbnail"]
            .iter()
            .any(|key| self.metadata.get(*key).is_some_and(|v| v == "true"))
    }
}

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn content_type_or_default<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default_content_type))
}

/// Storage events carry the size as a decimal string; accept numbers too.
/// Anything unparseable counts as 0.
fn size_from_string_or_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Size {
        Number(u64),
        Text(String),
        Other(serde_json::Value),
    }

    Ok(match Option::<Size>::deserialize(deserializer)? {
        Some(Size::Number(n)) => n,
        Some(Size::Text(s)) => s.trim().parse().unwrap_or(0),
        Some(Size::Other(_)) | None => 0,
    })
}

/// Content type and custom metadata stored alongside an object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectAttributes {
    pub content_type: String,
    pub metadata: BTreeMap<String, String>,
}

impl ObjectAttributes {
    fn is_empty(&self) -> bool {
        self.content_type.is_empty() && self.metadata.is_empty()
    }
}

// ============================================================================
// Storage
// ============================================================================

/// Object storage the pipeline reads uploads from and writes outputs to.
pub trait ObjectStore: Sync {
    fn download(&self, name: &str) -> Result<Vec<u8>, PipelineError>;

    fn upload(
        &self,
        name: &str,
        data: &[u8],
        attributes: &ObjectAttributes,
    ) -> Result<(), PipelineError>;

    fn delete(&self, name: &str) -> Result<(), PipelineError>;
}

/// A bucket backed by a local directory.
#[derive(Debug, Clone)]
pub struct FsBucket {
    root: PathBuf,
    name: String,
}

impl FsBucket {
    /// Open (creating if needed) a bucket rooted at `root`.
    ///
    /// The bucket name defaults to the directory name.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { root, name })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolve an object name to its file, refusing anything that could
    /// escape the bucket root or collide with a sidecar.
    fn object_path(&self, name: &str) -> Result<PathBuf, PipelineError> {
        let relative = Path::new(name);
        let valid = !name.is_empty()
            && !name.ends_with(META_SUFFIX)
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(PipelineError::InvalidObjectName(name.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn sidecar_path(object_path: &Path) -> PathBuf {
        let mut sidecar = object_path.as_os_str().to_owned();
        sidecar.push(META_SUFFIX);
        PathBuf::from(sidecar)
    }

    /// Stored attributes of `name`; default attributes when it has no sidecar.
    pub fn attributes(&self, name: &str) -> Result<ObjectAttributes, PipelineError> {
        let sidecar = Self::sidecar_path(&self.object_path(name)?);
        match fs::read_to_string(&sidecar) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ObjectAttributes::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Names of every object in the bucket, `/`-separated, sidecars excluded.
    pub fn objects(&self) -> Result<Vec<String>, PipelineError> {
        let mut names = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| PipelineError::Storage(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| PipelineError::Storage(e.to_string()))?;
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if !name.ends_with(META_SUFFIX) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Build the finalize event storage would emit for an existing object.
    pub fn event_for(&self, name: &str) -> Result<UploadEvent, PipelineError> {
        let path = self.object_path(name)?;
        let size = match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Err(PipelineError::ObjectNotFound(name.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(PipelineError::ObjectNotFound(name.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let attributes = self.attributes(name)?;
        let content_type = if attributes.content_type.is_empty() {
            mime_type(&file_extension(name)).to_string()
        } else {
            attributes.content_type
        };
        Ok(UploadEvent {
            bucket: self.name.clone(),
            name: name.to_string(),
            content_type,
            size,
            metadata: attributes.metadata,
        })
    }
}

/// Write `data` to `path` via a temp file in the same directory, so readers
/// never observe a partially written object.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), PipelineError> {
    let parent = path
        .parent()
        .ok_or_else(|| PipelineError::Storage(format!("no parent for {}", path.display())))?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| PipelineError::Io(e.error))?;
    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<bool, PipelineError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

impl ObjectStore for FsBucket {
    fn download(&self, name: &str) -> Result<Vec<u8>, PipelineError> {
        match fs::read(self.object_path(name)?) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(PipelineError::ObjectNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn upload(
        &self,
        name: &str,
        data: &[u8],
        attributes: &ObjectAttributes,
    ) -> Result<(), PipelineError> {
        let path = self.object_path(name)?;
        write_atomic(&path, data)?;
        let sidecar = Self::sidecar_path(&path);
        if attributes.is_empty() {
            remove_if_exists(&sidecar)?;
        } else {
            write_atomic(&sidecar, serde_json::to_string_pretty(attributes)?.as_bytes())?;
        }
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), PipelineError> {
        let path = self.object_path(name)?;
        if !remove_if_exists(&path)? {
            return Err(PipelineError::ObjectNotFound(name.to_string()));
        }
        remove_if_exists(&Self::sidecar_path(&path))?;
        Ok(())
    }
}

// ============================================================================
// Single upload
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The object is a converted output or thumbnail.
    AlreadyProcessed,
    /// The extension is not on the allow-list.
    UnsupportedFormat,
}

/// What happened in one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Uploaded {
        path: String,
        metadata: OutputMetadata,
    },
    /// Conversion only: the object is already in the target format.
    NotNeeded,
    /// Thumbnail only: thumbnails are switched off.
    Disabled,
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    Skipped {
        name: String,
        reason: SkipReason,
    },
    Processed {
        name: String,
        conversion: StepOutcome,
        thumbnail: StepOutcome,
        original_deleted: bool,
    },
}

impl UploadOutcome {
    pub fn name(&self) -> &str {
        match self {
            UploadOutcome::Skipped { name, .. } | UploadOutcome::Processed { name, .. } => name,
        }
    }

    /// Whether any step failed.
    pub fn has_failure(&self) -> bool {
        match self {
            UploadOutcome::Skipped { .. } => false,
            UploadOutcome::Processed {
                conversion,
                thumbnail,
                ..
            } => {
                matches!(conversion, StepOutcome::Failed { .. })
                    || matches!(thumbnail, StepOutcome::Failed { .. })
            }
        }
    }
}

/// Store a successful result under its output path.
///
/// Failures are passed through as [`StepOutcome::Failed`]; storage errors are
/// returned.
fn store_result(
    store: &impl ObjectStore,
    result: ConversionResult,
    content_type: &str,
    metadata: BTreeMap<String, String>,
) -> Result<StepOutcome, PipelineError> {
    match result {
        ConversionResult::Success {
            metadata: output,
            output_path,
            data,
        } => {
            let attributes = ObjectAttributes {
                content_type: content_type.to_string(),
                metadata,
            };
            store.upload(&output_path, &data, &attributes)?;
            Ok(StepOutcome::Uploaded {
                path: output_path,
                metadata: output,
            })
        }
        ConversionResult::Failure { error } => Ok(StepOutcome::Failed {
            error: error.to_string(),
        }),
    }
}

/// Handle one finalize event end to end.
///
/// Conversion failures are reported in the returned outcome; only storage
/// errors are returned as `Err`.
pub fn handle_upload<E: ImageEngine>(
    store: &impl ObjectStore,
    converter: &Converter<E>,
    config: &ConverterConfig,
    event: &UploadEvent,
) -> Result<UploadOutcome, PipelineError> {
    let span = info_span!(parent: converter.span(), "upload", object = %event.name);
    let _guard = span.enter();

    if event.is_pipeline_output() {
        info!(filename = %event.name, "skipping pipeline output");
        return Ok(UploadOutcome::Skipped {
            name: event.name.clone(),
            reason: SkipReason::AlreadyProcessed,
        });
    }
    if !config.is_supported_image(&event.name) {
        info!(filename = %event.name, "skipping unsupported file");
        return Ok(UploadOutcome::Skipped {
            name: event.name.clone(),
            reason: SkipReason::UnsupportedFormat,
        });
    }

    let input = store.download(&event.name)?;
    let target = config.target_format;
    let quality = config.quality();
    let content_type = mime_type(target.as_str());
    let mut original_deleted = false;

    let conversion = if converter.needs_conversion(&input, target, quality) {
        let options = ConversionOptions::new(target, quality);
        let result = converter.convert(&input, &options, &event.name);
        let metadata = BTreeMap::from([
            ("converted".to_string(), "true".to_string()),
            ("originalFormat".to_string(), event.content_type.clone()),
        ]);
        let outcome = store_result(store, result, content_type, metadata)?;

        if let StepOutcome::Uploaded { path, .. } = &outcome {
            // An output stored under the source name already replaced it
            if !config.preserve_original && *path != event.name {
                store.delete(&event.name)?;
                original_deleted = true;
                info!(filename = %event.name, "deleted original");
            }
        }
        outcome
    } else {
        info!(filename = %event.name, format = %target, "already in target format");
        StepOutcome::NotNeeded
    };

    let thumbnail = match config.thumbnail_size() {
        Some(size) => {
            let options = ThumbnailOptions {
                size,
                format: target,
                quality,
            };
            let result = converter.generate_thumbnail(&input, &options, &event.name);
            let metadata = BTreeMap::from([
                ("thumbnail".to_string(), "true".to_string()),
                ("originalImage".to_string(), event.name.clone()),
            ]);
            store_result(store, result, content_type, metadata)?
        }
        None => StepOutcome::Disabled,
    };

    for (step, outcome) in [("conversion", &conversion), ("thumbnail", &thumbnail)] {
        if let StepOutcome::Failed { error } = outcome {
            error!(filename = %event.name, step, %error, "upload step failed");
        }
    }

    Ok(UploadOutcome::Processed {
        name: event.name.clone(),
        conversion,
        thumbnail,
        original_deleted,
    })
}
