//! Compositor: fits the subject onto a fixed canvas above a soft shadow

use super::enhance::{paste_with_alpha_mask, sharpen};
use crate::config::CanvasConfig;
use crate::error::{BottleError, Result};
use crate::types::{CompositeLayout, ShadowSpec};
use image::{imageops, imageops::FilterType, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_ellipse_mut;
use imageproc::filter::gaussian_blur_f32;

const SHADOW_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Compose the final canvas for a cropped subject
///
/// Steps: uniform Lanczos resize into the padded area, sharpen, draw the
/// blurred shadow layer, paste the shadow then the subject.
///
/// # Errors
/// - Subject with a zero dimension
pub fn compose(subject: &RgbaImage, canvas: &CanvasConfig) -> Result<(RgbaImage, CompositeLayout)> {
    let (width, height) = subject.dimensions();
    let (new_w, new_h) = CompositeLayout::fit_subject(canvas, width, height)?;
    let layout = CompositeLayout::compute(canvas, new_w, new_h);

    log::debug!(
        "Compositing {}x{} subject as {}x{} at ({}, {}) on {}x{} canvas",
        width,
        height,
        new_w,
        new_h,
        layout.subject_x,
        layout.subject_y,
        layout.canvas_width,
        layout.canvas_height
    );

    let resized = imageops::resize(subject, new_w, new_h, FilterType::Lanczos3);
    let sharpened = sharpen(&resized, canvas.sharpen_factor);

    let mut output = RgbaImage::new(layout.canvas_width, layout.canvas_height);
    let shadow = render_shadow(&layout.shadow, layout.canvas_width, layout.canvas_height)?;
    paste_with_alpha_mask(&mut output, &shadow, 0, 0);
    paste_with_alpha_mask(&mut output, &sharpened, layout.subject_x, layout.subject_y);

    Ok((output, layout))
}

/// Render the shadow on its own transparent canvas-sized layer
///
/// # Errors
/// - Shadow coordinates that do not fit the drawing primitives
pub fn render_shadow(spec: &ShadowSpec, canvas_width: u32, canvas_height: u32) -> Result<RgbaImage> {
    let mut layer = RgbaImage::new(canvas_width, canvas_height);
    if spec.width == 0 || spec.height == 0 {
        return Ok(layer);
    }

    let to_i32 = |value: i64| {
        i32::try_from(value).map_err(|_| {
            BottleError::processing_stage_error("shadow", "ellipse coordinates out of range", None)
        })
    };
    let (cx, cy) = spec.center();
    let center = (to_i32(cx)?, to_i32(cy)?);
    let radius_x = to_i32(i64::from(spec.width / 2))?;
    let radius_y = to_i32(i64::from(spec.height / 2))?;

    draw_filled_ellipse_mut(&mut layer, center, radius_x, radius_y, SHADOW_COLOR);

    if spec.blur_radius > 0.0 {
        layer = gaussian_blur_f32(&layer, spec.blur_radius);
    }

    for pixel in layer.pixels_mut() {
        pixel[3] = (f32::from(pixel[3]) * spec.opacity).round().clamp(0.0, 255.0) as u8;
    }

    Ok(layer)
}
