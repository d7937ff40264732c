//! Bounding cropper: trims transparent margins around the subject

use crate::types::{BoundingBox, DegenerateMask, StageOutcome};
use image::{DynamicImage, RgbaImage};

/// Tight box around every pixel whose alpha exceeds `threshold`
///
/// Returns `None` when no pixel qualifies.
#[must_use]
pub fn content_bounds(image: &RgbaImage, threshold: u8) -> Option<BoundingBox> {
    let mut bounds: Option<BoundingBox> = None;

    for (x, y, pixel) in image.enumerate_pixels() {
        if pixel[3] <= threshold {
            continue;
        }
        bounds = Some(match bounds {
            None => BoundingBox {
                x_min: x,
                y_min: y,
                x_max: x,
                y_max: y,
            },
            Some(b) => BoundingBox {
                x_min: b.x_min.min(x),
                y_min: b.y_min.min(y),
                x_max: b.x_max.max(x),
                y_max: b.y_max.max(y),
            },
        });
    }

    bounds
}

/// Crop to the tight bounding box of pixels with alpha above `threshold`
///
/// Never fails. Images without an alpha channel or without a qualifying
/// pixel come back untouched with a `Fallback` outcome. Cropping an already
/// tight image is a no-op reported as `Unchanged`.
#[must_use]
pub fn crop_to_content(image: DynamicImage, threshold: u8) -> (DynamicImage, StageOutcome<BoundingBox>) {
    if !image.color().has_alpha() {
        log::debug!("Skipping crop: {}", DegenerateMask::MissingAlpha);
        return (image, StageOutcome::Fallback(DegenerateMask::MissingAlpha));
    }

    let bounds = match image.as_rgba8() {
        Some(rgba) => content_bounds(rgba, threshold),
        None => content_bounds(&image.to_rgba8(), threshold),
    };

    match bounds {
        None => {
            log::debug!("Skipping crop: {}", DegenerateMask::NoOpaquePixels);
            (image, StageOutcome::Fallback(DegenerateMask::NoOpaquePixels))
        },
        Some(bbox) if bbox.covers(image.width(), image.height()) => (image, StageOutcome::Unchanged),
        Some(bbox) => {
            log::debug!(
                "Cropping {}x{} to {}x{} at ({}, {})",
                image.width(),
                image.height(),
                bbox.width(),
                bbox.height(),
                bbox.x_min,
                bbox.y_min
            );
            let cropped = image.crop_imm(bbox.x_min, bbox.y_min, bbox.width(), bbox.height());
            (cropped, StageOutcome::Applied(bbox))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba};

    fn subject_on_transparent(width: u32, height: u32, rect: (u32, u32, u32, u32)) -> RgbaImage {
        let (x0, y0, x1, y1) = rect;
        RgbaImage::from_fn(width, height, |x, y| {
            if (x0..=x1).contains(&x) && (y0..=y1).contains(&y) {
                Rgba([200, 40, 40, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        })
    }

    #[test]
    fn test_crops_to_subject() {
        let image = subject_on_transparent(50, 40, (10, 5, 19, 34));
        let (cropped, outcome) = crop_to_content(DynamicImage::ImageRgba8(image), 20);

        assert_eq!(cropped.width(), 10);
        assert_eq!(cropped.height(), 30);
        assert_eq!(
            outcome,
            StageOutcome::Applied(BoundingBox {
                x_min: 10,
                y_min: 5,
                x_max: 19,
                y_max: 34
            })
        );
    }

    #[test]
    fn test_faint_pixels_are_ignored() {
        let mut image = subject_on_transparent(30, 30, (10, 10, 14, 14));
        image.put_pixel(0, 0, Rgba([255, 255, 255, 20]));
        image.put_pixel(29, 29, Rgba([255, 255, 255, 21]));

        let bounds = content_bounds(&image, 20).unwrap();
        assert_eq!((bounds.x_min, bounds.y_min), (10, 10));
        assert_eq!((bounds.x_max, bounds.y_max), (29, 29));
    }

    #[test]
    fn test_idempotent() {
        let image = subject_on_transparent(64, 64, (7, 3, 40, 60));
        let (once, first) = crop_to_content(DynamicImage::ImageRgba8(image), 20);
        let (twice, second) = crop_to_content(once.clone(), 20);

        assert!(first.is_applied());
        assert_eq!(second, StageOutcome::Unchanged);
        assert_eq!(once.to_rgba8(), twice.to_rgba8());
    }

    #[test]
    fn test_fully_transparent_is_identity() {
        let image = RgbaImage::from_pixel(25, 17, Rgba([10, 10, 10, 5]));
        let (out, outcome) = crop_to_content(DynamicImage::ImageRgba8(image), 20);
        assert_eq!((out.width(), out.height()), (25, 17));
        assert_eq!(outcome, StageOutcome::Fallback(DegenerateMask::NoOpaquePixels));
    }

    #[test]
    fn test_missing_alpha_is_identity() {
        let image = RgbImage::from_pixel(12, 9, Rgb([1, 2, 3]));
        let (out, outcome) = crop_to_content(DynamicImage::ImageRgb8(image), 20);
        assert_eq!((out.width(), out.height()), (12, 9));
        assert_eq!(outcome, StageOutcome::Fallback(DegenerateMask::MissingAlpha));
    }
}
