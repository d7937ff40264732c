//! Core types shared by the pipeline stages

use crate::config::{CanvasConfig, OutputFormat};
use crate::error::{BottleError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tight bounding box of the subject, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl BoundingBox {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.x_max - self.x_min + 1
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.y_max - self.y_min + 1
    }

    /// Whether the box spans an entire `width x height` image
    #[must_use]
    pub fn covers(&self, width: u32, height: u32) -> bool {
        self.x_min == 0 && self.y_min == 0 && self.width() == width && self.height() == height
    }
}

/// Minimal-area rotated rectangle around the subject's outer contour
///
/// `angle` is in degrees within `[-90, 0)`, measured in image coordinates
/// (y pointing down). `width` is the extent along the edge at `angle`,
/// `height` the extent perpendicular to it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientedRect {
    pub center: (f64, f64),
    pub width: f64,
    pub height: f64,
    pub angle: f64,
}

impl OrientedRect {
    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Why a best-effort stage could not do its job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegenerateMask {
    /// The image has no alpha channel to derive a mask from
    MissingAlpha,
    /// No pixel passes the opacity threshold
    NoOpaquePixels,
    /// The mask has no outer contour
    NoContour,
    /// The largest contour is too small to define an orientation
    DegenerateContour,
}

impl std::fmt::Display for DegenerateMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingAlpha => write!(f, "image has no alpha channel"),
            Self::NoOpaquePixels => write!(f, "no pixel above the opacity threshold"),
            Self::NoContour => write!(f, "mask has no outer contour"),
            Self::DegenerateContour => write!(f, "largest contour is degenerate"),
        }
    }
}

/// Outcome of a best-effort stage
///
/// `Unchanged` means there was nothing to do. `Fallback` means the stage
/// could not run and returned its input untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum StageOutcome<T> {
    Applied(T),
    Unchanged,
    Fallback(DegenerateMask),
}

impl<T> StageOutcome<T> {
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }

    /// Short label used in logs and batch summaries
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Applied(_) => "applied",
            Self::Unchanged => "unchanged",
            Self::Fallback(_) => "fallback",
        }
    }
}

/// Shadow ellipse placement on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowSpec {
    /// Left edge of the ellipse bounding box (may be negative)
    pub x1: i64,
    /// Top edge of the ellipse bounding box
    pub y1: i64,
    pub width: u32,
    pub height: u32,
    pub blur_radius: f32,
    pub opacity: f32,
}

impl ShadowSpec {
    /// Center of the ellipse bounding box
    #[must_use]
    pub fn center(&self) -> (i64, i64) {
        (
            self.x1 + i64::from(self.width) / 2,
            self.y1 + i64::from(self.height) / 2,
        )
    }
}

/// Every coordinate the compositor needs, derived from the resized subject
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeLayout {
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub subject_width: u32,
    pub subject_height: u32,
    pub floor_y: i64,
    pub subject_x: i64,
    pub subject_y: i64,
    pub shadow: ShadowSpec,
}

impl CompositeLayout {
    /// Size a `width x height` subject to fit the padded canvas
    ///
    /// Returns the resized dimensions, truncated toward zero and each at least 1.
    ///
    /// # Errors
    /// - Subject with a zero dimension
    pub fn fit_subject(canvas: &CanvasConfig, width: u32, height: u32) -> Result<(u32, u32)> {
        if width == 0 || height == 0 {
            return Err(BottleError::processing_stage_error(
                "fit",
                "subject has a zero dimension",
                Some(&format!("{width}x{height}")),
            ));
        }

        let avail_w = f64::from(canvas.target_width.saturating_sub(canvas.pad_width));
        let avail_h = f64::from(canvas.target_height.saturating_sub(canvas.pad_height));
        let scale = (avail_w / f64::from(width)).min(avail_h / f64::from(height));

        let new_w = ((f64::from(width) * scale).trunc() as u32).max(1);
        let new_h = ((f64::from(height) * scale).trunc() as u32).max(1);
        Ok((new_w, new_h))
    }

    /// Compute the layout for a subject already resized to `subject_width x subject_height`
    #[must_use]
    pub fn compute(canvas: &CanvasConfig, subject_width: u32, subject_height: u32) -> Self {
        let w = i64::from(canvas.target_width);
        let h = i64::from(canvas.target_height);
        let new_w = i64::from(subject_width);
        let new_h = i64::from(subject_height);

        let shadow_w = (f64::from(subject_width) * canvas.shadow_width_ratio).trunc() as u32;
        let shadow_h = (f64::from(subject_width) * canvas.shadow_height_ratio).trunc() as u32;

        let floor_y = h - i64::from(canvas.bottom_margin);
        let shadow = ShadowSpec {
            x1: (w - i64::from(shadow_w)).div_euclid(2),
            y1: floor_y - i64::from(shadow_h) / 2,
            width: shadow_w,
            height: shadow_h,
            blur_radius: canvas.shadow_blur_radius,
            opacity: canvas.shadow_opacity,
        };

        Self {
            canvas_width: canvas.target_width,
            canvas_height: canvas.target_height,
            subject_width,
            subject_height,
            floor_y,
            subject_x: (w - new_w).div_euclid(2),
            subject_y: floor_y - new_h + i64::from(canvas.vertical_offset),
            shadow,
        }
    }
}

/// Detailed timing breakdown for one processed image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Model loading time (first call only)
    pub model_load_ms: Option<u64>,

    /// Decoding and input size guard
    pub decode_ms: u64,

    /// Subject extraction (segmentation)
    pub extraction_ms: u64,

    /// Orientation normalizer
    pub orientation_ms: u64,

    /// Bounding cropper
    pub crop_ms: u64,

    /// Resize, sharpen, shadow and paste
    pub composite_ms: u64,

    /// Output encoding
    pub encode_ms: u64,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Get the unaccounted overhead time
    #[must_use]
    pub fn other_overhead_ms(&self) -> u64 {
        let measured = self.model_load_ms.unwrap_or(0)
            + self.decode_ms
            + self.extraction_ms
            + self.orientation_ms
            + self.crop_ms
            + self.composite_ms
            + self.encode_ms;
        self.total_ms.saturating_sub(measured)
    }
}

/// Result of processing one bottle photo
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// Encoded output image
    pub data: Vec<u8>,
    pub format: OutputFormat,
    /// Canvas dimensions of the encoded image
    pub dimensions: (u32, u32),
    /// Applied rotation in degrees, when any
    pub orientation: StageOutcome<f64>,
    /// Crop box in the oriented image, when any
    pub crop: StageOutcome<BoundingBox>,
    pub layout: CompositeLayout,
    pub timings: ProcessingTimings,
}

impl ProcessingResult {
    /// MIME type of the encoded data
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        crate::services::OutputFormatHandler::content_type(self.format)
    }

    /// Write the encoded image to disk, creating parent directories
    ///
    /// # Errors
    /// - File system errors while creating directories or writing
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| BottleError::file_io_error("create directory", parent, &e))?;
            }
        }
        std::fs::write(path, &self.data)
            .map_err(|e| BottleError::file_io_error("write output", path, &e))
    }

    /// One-line human readable timing summary
    #[must_use]
    pub fn timing_summary(&self) -> String {
        let t = &self.timings;
        let mut summary = format!(
            "total {}ms (decode {}ms, extract {}ms, orient {}ms, crop {}ms, composite {}ms, encode {}ms)",
            t.total_ms,
            t.decode_ms,
            t.extraction_ms,
            t.orientation_ms,
            t.crop_ms,
            t.composite_ms,
            t.encode_ms
        );
        if let Some(load) = t.model_load_ms {
            summary.push_str(&format!(", model load {load}ms"));
        }
        summary
    }
}

/// One entry of a batch run
#[derive(Debug)]
pub struct BatchItem {
    /// Caller supplied name (usually the file name)
    pub name: String,
    pub result: Result<ProcessingResult>,
}

/// Per-item outcome of a sequential batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.items.iter().filter(|item| item.result.is_ok()).count()
    }

    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.items.len() - self.success_count()
    }

    /// Names and error messages of the failed items
    #[must_use]
    pub fn failures(&self) -> Vec<(&str, String)> {
        self.items
            .iter()
            .filter_map(|item| match &item.result {
                Ok(_) => None,
                Err(e) => Some((item.name.as_str(), e.to_string())),
            })
            .collect()
    }
}
