//! Orientation normalizer
//!
//! Finds the principal axis of the subject from the outer contour of its
//! opacity mask and rotates the image so that axis is vertical. Detection
//! is best effort: anything that prevents a confident estimate returns the
//! input untouched together with the reason.

use super::mask::OpacityMask;
use crate::types::{DegenerateMask, OrientedRect, StageOutcome};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use imageproc::geometry::convex_hull;
use imageproc::point::Point;

/// Rotations smaller than this are treated as already upright
pub const MIN_ROTATION_DEGREES: f64 = 0.01;

/// Rotate the subject upright
///
/// `threshold` selects mask pixels (`alpha > threshold`). Tilts larger than
/// `max_tilt_degrees` are assumed to be detection noise and ignored.
#[must_use]
pub fn normalize_orientation(
    image: DynamicImage,
    threshold: u8,
    max_tilt_degrees: f64,
) -> (DynamicImage, StageOutcome<f64>) {
    if !image.color().has_alpha() {
        log::debug!("Skipping orientation: {}", DegenerateMask::MissingAlpha);
        return (image, StageOutcome::Fallback(DegenerateMask::MissingAlpha));
    }

    let rgba = match image {
        DynamicImage::ImageRgba8(buffer) => buffer,
        other => other.to_rgba8(),
    };

    let angle = match detect_tilt(&rgba, threshold, max_tilt_degrees) {
        Ok(angle) => angle,
        Err(reason) => {
            log::debug!("Skipping orientation: {reason}");
            return (DynamicImage::ImageRgba8(rgba), StageOutcome::Fallback(reason));
        },
    };

    if angle == 0.0 {
        return (DynamicImage::ImageRgba8(rgba), StageOutcome::Unchanged);
    }

    log::debug!("Rotating subject by {angle:.2} degrees");
    let rotated = rotate_expand(&rgba, angle);
    (DynamicImage::ImageRgba8(rotated), StageOutcome::Applied(angle))
}

/// Counter-clockwise rotation in degrees that brings the subject upright
///
/// # Errors
/// The [`DegenerateMask`] reason when no estimate is possible
pub fn detect_tilt(
    image: &RgbaImage,
    threshold: u8,
    max_tilt_degrees: f64,
) -> Result<f64, DegenerateMask> {
    let mask = OpacityMask::from_rgba(image, threshold);
    if mask.is_empty() {
        return Err(DegenerateMask::NoOpaquePixels);
    }

    let contour = largest_outer_contour(&mask).ok_or(DegenerateMask::NoContour)?;
    let rect = min_area_rect(&contour.points).ok_or(DegenerateMask::DegenerateContour)?;
    log::trace!(
        "Oriented rect: center=({:.1}, {:.1}) size={:.1}x{:.1} angle={:.2}",
        rect.center.0,
        rect.center.1,
        rect.width,
        rect.height,
        rect.angle
    );

    Ok(tilt_from_rect(&rect, max_tilt_degrees))
}

/// Outer top-level contour enclosing the largest area
///
/// Ties keep the contour found first in raster traversal order. The image
/// frame counts as background, so subjects touching an edge are traced too.
#[must_use]
pub fn largest_outer_contour(mask: &OpacityMask) -> Option<Contour<i32>> {
    find_contours::<i32>(&mask.with_empty_border())
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|mut contour| {
            for point in &mut contour.points {
                point.x -= 1;
                point.y -= 1;
            }
            contour
        })
        .fold(None, |best: Option<(f64, Contour<i32>)>, contour| {
            let area = polygon_area(&contour.points);
            match best {
                Some((best_area, _)) if best_area >= area => best,
                _ => Some((area, contour)),
            }
        })
        .map(|(_, contour)| contour)
}

/// Enclosed area of a closed polygon (shoelace formula)
#[must_use]
pub fn polygon_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| i64::from(a.x) * i64::from(b.y) - i64::from(b.x) * i64::from(a.y))
        .sum();
    twice.abs() as f64 / 2.0
}

/// Minimal-area enclosing rectangle (rotating calipers over the convex hull)
///
/// Returns `None` when the hull has fewer than three points.
#[must_use]
pub fn min_area_rect(points: &[Point<i32>]) -> Option<OrientedRect> {
    let hull: Vec<(f64, f64)> = convex_hull(points)
        .into_iter()
        .map(|p| (f64::from(p.x), f64::from(p.y)))
        .collect();
    if hull.len() < 3 {
        return None;
    }

    let mut best: Option<(f64, OrientedRect)> = None;

    for (i, &(x0, y0)) in hull.iter().enumerate() {
        let (x1, y1) = hull.get((i + 1) % hull.len()).copied()?;
        let (dx, dy) = (x1 - x0, y1 - y0);
        let len = dx.hypot(dy);
        if len < 1e-9 {
            continue;
        }
        let (ux, uy) = (dx / len, dy / len);
        let (vx, vy) = (-uy, ux);

        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(px, py) in &hull {
            let pu = px * ux + py * uy;
            let pv = px * vx + py * vy;
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }

        let width = max_u - min_u;
        let height = max_v - min_v;
        let area = width * height;
        if best.as_ref().is_some_and(|(best_area, _)| *best_area <= area) {
            continue;
        }

        let mid_u = (min_u + max_u) / 2.0;
        let mid_v = (min_v + max_v) / 2.0;
        let center = (mid_u * ux + mid_v * vx, mid_u * uy + mid_v * vy);
        let rect = normalize_rect_angle(center, width, height, uy.atan2(ux).to_degrees());
        best = Some((area, rect));
    }

    best.map(|(_, rect)| rect)
}

/// Bring the angle into `[-90, 0)`, swapping extents on every quarter turn
fn normalize_rect_angle(center: (f64, f64), width: f64, height: f64, angle: f64) -> OrientedRect {
    let (mut width, mut height, mut angle) = (width, height, angle);
    while angle >= 0.0 {
        angle -= 90.0;
        std::mem::swap(&mut width, &mut height);
    }
    while angle < -90.0 {
        angle += 90.0;
        std::mem::swap(&mut width, &mut height);
    }
    OrientedRect {
        center,
        width,
        height,
        angle,
    }
}

/// Rotation that makes the rectangle's long side vertical
#[must_use]
pub fn tilt_from_rect(rect: &OrientedRect, max_tilt_degrees: f64) -> f64 {
    let mut angle = rect.angle;
    if rect.width > rect.height {
        angle += 90.0;
    }
    if angle.abs() > max_tilt_degrees || angle.abs() < MIN_ROTATION_DEGREES {
        return 0.0;
    }
    angle
}

/// Rotate counter-clockwise by `angle_degrees` about the center, growing the
/// canvas to hold the whole result
///
/// Uses bicubic sampling; exposed corners are fully transparent.
#[must_use]
pub fn rotate_expand(image: &RgbaImage, angle_degrees: f64) -> RgbaImage {
    let (width, height) = image.dimensions();
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let (w, h) = (f64::from(width), f64::from(height));

    let new_width = expanded_extent(w * cos.abs() + h * sin.abs());
    let new_height = expanded_extent(w * sin.abs() + h * cos.abs());

    // imageproc rotates clockwise in image coordinates
    let projection = Projection::translate(new_width as f32 / 2.0, new_height as f32 / 2.0)
        * Projection::rotate(-(angle_degrees.to_radians() as f32))
        * Projection::translate(-(width as f32) / 2.0, -(height as f32) / 2.0);

    let mut output = RgbaImage::new(new_width, new_height);
    warp_into(
        image,
        &projection,
        Interpolation::Bicubic,
        Rgba([0, 0, 0, 0]),
        &mut output,
    );
    output
}

fn expanded_extent(extent: f64) -> u32 {
    ((extent - 1e-6).ceil() as u32).max(1)
}
