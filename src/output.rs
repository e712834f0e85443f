//! CLI output formatting for the upload pipeline.
//!
//! # Output Format
//!
//! ## Single upload
//!
//! ```text
//! images/photo.png
//!     conversion: images/photo.jpg (jpeg 1200x800, 183204 bytes)
//!     thumbnail: images/photo_thumb.jpg (jpeg 200x133, 9120 bytes)
//!     original: deleted
//! ```
//!
//! Skipped uploads collapse to one line:
//!
//! ```text
//! notes.txt: skipped (unsupported format)
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::pipeline::{SkipReason, StepOutcome, UploadOutcome};

fn skip_reason(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::AlreadyProcessed => "already processed",
        SkipReason::UnsupportedFormat => "unsupported format",
    }
}

fn step_line(label: &str, step: &StepOutcome) -> String {
    let detail = match step {
        StepOutcome::Uploaded { path, metadata } => format!(
            "{} ({} {}x{}, {} bytes)",
            path, metadata.format, metadata.width, metadata.height, metadata.size_in_bytes
        ),
        StepOutcome::NotNeeded => "not needed".to_string(),
        StepOutcome::Disabled => "disabled".to_string(),
        StepOutcome::Failed { error } => format!("failed: {}", error),
    };
    format!("    {}: {}", label, detail)
}

/// Format the outcome of one handled upload.
pub fn format_upload_outcome(outcome: &UploadOutcome) -> Vec<String> {
    match outcome {
        UploadOutcome::Skipped { name, reason } => {
            vec![format!("{}: skipped ({})", name, skip_reason(*reason))]
        }
        UploadOutcome::Processed {
            name,
            conversion,
            thumbnail,
            original_deleted,
        } => {
            let original = if *original_deleted { "deleted" } else { "kept" };
            vec![
                name.clone(),
                step_line("conversion", conversion),
                step_line("thumbnail", thumbnail),
                format!("    original: {}", original),
            ]
        }
    }
}

pub fn print_upload_outcome(outcome: &UploadOutcome) {
    for line in format_upload_outcome(outcome) {
        println!("{}", line);
    }
}
