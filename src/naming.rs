//! Object-name conventions shared by the converter and the pipeline.
//!
//! Converted outputs live next to their source object:
//!
//! - `images/test.jpg` → `images/test.png` (conversion to png)
//! - `images/test.jpg` → `images/test_thumb.webp` (thumbnail as webp)
//! - `images/test.image.jpg` → `images/test.image.png` (only the last
//!   extension is replaced)
//!
//! Only the final path segment is searched for an extension, so a dotted
//! directory (`v1.2/photo`) is never mistaken for one.

use crate::imaging::ImageFormatToken;

/// Split `name` into (base, extension) at the last dot of its final segment.
fn split_extension(name: &str) -> (&str, Option<&str>) {
    let segment_start = name.rfind('/').map(|i| i + 1).unwrap_or(0);
    match name[segment_start..].rfind('.') {
        Some(dot) => {
            let dot = segment_start + dot;
            (&name[..dot], Some(&name[dot + 1..]))
        }
        None => (name, None),
    }
}

/// Derive the storage path of a converted output or thumbnail.
///
/// # Examples
/// ```
/// # use upload_converter::naming::generate_output_path;
/// # use upload_converter::imaging::ImageFormatToken;
/// assert_eq!(
///     generate_output_path("images/test.jpg", ImageFormatToken::Webp, true),
///     "images/test_thumb.webp"
/// );
/// ```
pub fn generate_output_path(
    original_path: &str,
    target_format: ImageFormatToken,
    is_thumbnail: bool,
) -> String {
    let (base, _) = split_extension(original_path);
    let suffix = if is_thumbnail { "_thumb" } else { "" };
    format!("{base}{suffix}.{target_format}")
}

/// Lowercased extension of `name`, with `jpeg` folded into `jpg`.
///
/// Returns an empty string when there is no extension.
pub fn file_extension(name: &str) -> String {
    match split_extension(name).1 {
        Some(ext) => {
            let ext = ext.to_ascii_lowercase();
            if ext == "jpeg" { "jpg".to_string() } else { ext }
        }
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_replaces_extension() {
        assert_eq!(
            generate_output_path("images/test.jpg", ImageFormatToken::Png, false),
            "images/test.png"
        );
    }

    #[test]
    fn output_path_for_thumbnail() {
        assert_eq!(
            generate_output_path("images/test.jpg", ImageFormatToken::Webp, true),
            "images/test_thumb.webp"
        );
    }

    #[test]
    fn output_path_keeps_inner_dots() {
        assert_eq!(
            generate_output_path("images/test.image.jpg", ImageFormatToken::Png, false),
            "images/test.image.png"
        );
    }

    #[test]
    fn output_path_uses_token_spelling() {
        assert_eq!(
            generate_output_path("a.png", ImageFormatToken::Jpeg, false),
            "a.jpeg"
        );
        assert_eq!(generate_output_path("a.png", ImageFormatToken::Jpg, false), "a.jpg");
    }

    #[test]
    fn output_path_without_extension_appends() {
        assert_eq!(
            generate_output_path("uploads/testfile", ImageFormatToken::Png, false),
            "uploads/testfile.png"
        );
    }

    #[test]
    fn output_path_ignores_dotted_directories() {
        assert_eq!(
            generate_output_path("v1.2/photo", ImageFormatToken::Png, true),
            "v1.2/photo_thumb.png"
        );
    }

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(file_extension("IMG_001.PNG"), "png");
        assert_eq!(file_extension("dir/pic.WebP"), "webp");
    }

    #[test]
    fn extension_folds_jpeg_into_jpg() {
        assert_eq!(file_extension("photo.jpeg"), "jpg");
        assert_eq!(file_extension("photo.JPG"), "jpg");
    }

    #[test]
    fn extension_missing() {
        assert_eq!(file_extension("testfile"), "");
        assert_eq!(file_extension("some.dir/testfile"), "");
    }
}
