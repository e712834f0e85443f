//! Pure calculation functions for image dimensions.
//!
//! All functions here are pure and testable without any I/O or images.
//!
//! Two planners live here:
//!
//! - [`plan_thumbnail`] fits an image into a square bounding box, keeping the
//!   aspect ratio. The longer edge becomes the box edge.
//! - [`plan_resize`] maps a source onto a requested width/height under a
//!   [`FitMode`], never enlarging the source.

use super::engine::Dimensions;
use super::format::FitMode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DimensionError {
    #[error("cannot compute aspect ratio of a {width}x{height} image")]
    ZeroDimension { width: u32, height: u32 },
    #[error("thumbnail bounding size must be positive")]
    ZeroBoundingSize,
}

/// Round a computed edge and keep it at least one pixel wide.
fn edge(value: f64) -> u32 {
    (value.round() as u32).max(1)
}

/// Calculate thumbnail dimensions inside a square bounding box.
///
/// # Arguments
/// * `original_width`, `original_height` - Source dimensions
/// * `bounding_size` - Edge of the bounding box in pixels
///
/// # Returns
/// * `(width, height)` - Thumbnail dimensions, both `<= bounding_size`
///
/// Wider-than-tall sources get `width = bounding_size`; everything else
/// (including squares) gets `height = bounding_size`. A zero source edge has
/// no aspect ratio and is rejected.
///
/// # Examples
/// ```
/// # use upload_converter::imaging::plan_thumbnail;
/// assert_eq!(plan_thumbnail(200, 100, 50), Ok((50, 25)));
/// assert_eq!(plan_thumbnail(100, 200, 50), Ok((25, 50)));
/// ```
pub fn plan_thumbnail(
    original_width: u32,
    original_height: u32,
    bounding_size: u32,
) -> Result<(u32, u32), DimensionError> {
    if original_width == 0 || original_height == 0 {
        return Err(DimensionError::ZeroDimension {
            width: original_width,
            height: original_height,
        });
    }
    if bounding_size == 0 {
        return Err(DimensionError::ZeroBoundingSize);
    }

    let ratio = original_width as f64 / original_height as f64;
    let size = bounding_size as f64;

    if ratio > 1.0 {
        // Landscape: width takes the full box edge
        Ok((bounding_size, edge(size / ratio)))
    } else {
        // Portrait or square: height takes the full box edge
        Ok((edge(size * ratio), bounding_size))
    }
}

/// How to turn a source image into the requested output.
///
/// `scaled` is the size the source is resampled to. `canvas` is the final
/// output size: equal to `scaled` for `inside`, `outside` and `fill`, smaller
/// for `cover` (center crop), larger for `contain` (centered padding).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub fit: FitMode,
    pub scaled: Dimensions,
    pub canvas: Dimensions,
}

impl ResizePlan {
    fn identity(source: Dimensions, fit: FitMode) -> Self {
        Self {
            fit,
            scaled: source,
            canvas: source,
        }
    }

    /// True when executing the plan would leave `source` untouched.
    pub fn is_noop(&self, source: Dimensions) -> bool {
        self.scaled == source && self.canvas == source
    }
}

fn scale(source: Dimensions, factor: f64) -> Dimensions {
    Dimensions {
        width: edge(source.width as f64 * factor),
        height: edge(source.height as f64 * factor),
    }
}

/// Plan a resize of `source` into a `width` x `height` box.
///
/// A missing edge is derived from the source aspect ratio. The scale factor
/// never exceeds 1: a source smaller than the box keeps its size.
pub fn plan_resize(
    source: Dimensions,
    width: Option<u32>,
    height: Option<u32>,
    fit: FitMode,
) -> ResizePlan {
    if source.width == 0 || source.height == 0 {
        return ResizePlan::identity(source, fit);
    }

    let aspect = source.width as f64 / source.height as f64;
    let (box_w, box_h) = match (width, height) {
        (Some(w), Some(h)) => (w.max(1), h.max(1)),
        (Some(w), None) => (w.max(1), edge(w as f64 / aspect)),
        (None, Some(h)) => (edge(h as f64 * aspect), h.max(1)),
        (None, None) => return ResizePlan::identity(source, fit),
    };

    let scale_x = box_w as f64 / source.width as f64;
    let scale_y = box_h as f64 / source.height as f64;

    match fit {
        FitMode::Inside => {
            let scaled = scale(source, scale_x.min(scale_y).min(1.0));
            ResizePlan {
                fit,
                scaled,
                canvas: scaled,
            }
        }
        FitMode::Outside => {
            let scaled = scale(source, scale_x.max(scale_y).min(1.0));
            ResizePlan {
                fit,
                scaled,
                canvas: scaled,
            }
        }
        FitMode::Cover => {
            let scaled = scale(source, scale_x.max(scale_y).min(1.0));
            ResizePlan {
                fit,
                scaled,
                canvas: Dimensions {
                    width: box_w.min(scaled.width),
                    height: box_h.min(scaled.height),
                },
            }
        }
        FitMode::Contain => {
            let factor = scale_x.min(scale_y);
            if factor >= 1.0 {
                // Source already fits: no enlargement, no padding
                return ResizePlan::identity(source, fit);
            }
            ResizePlan {
                fit,
                scaled: scale(source, factor),
                canvas: Dimensions {
                    width: box_w,
                    height: box_h,
                },
            }
        }
        FitMode::Fill => {
            let scaled = Dimensions {
                width: box_w.min(source.width),
                height: box_h.min(source.height),
            };
            ResizePlan {
                fit,
                scaled,
                canvas: scaled,
            }
        }
    }
}
