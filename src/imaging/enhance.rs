//! Pixel-level helpers used by the compositor

use image::{Rgba, RgbaImage};

/// Weight of the center pixel in the 3x3 smoothing kernel (neighbors weigh 1)
const SMOOTH_CENTER_WEIGHT: u32 = 5;
const SMOOTH_KERNEL_SUM: u32 = 8 + SMOOTH_CENTER_WEIGHT;

/// Adjust sharpness by blending the image away from a smoothed copy
///
/// `factor` 1.0 returns the input, 0.0 the smoothed image, larger values
/// sharpen. Alpha is preserved exactly. The one-pixel border is left as is,
/// and images smaller than 3x3 are returned unchanged.
#[must_use]
pub fn sharpen(image: &RgbaImage, factor: f32) -> RgbaImage {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 || (factor - 1.0).abs() < f32::EPSILON {
        return image.clone();
    }

    RgbaImage::from_fn(width, height, |x, y| {
        let original = *image.get_pixel(x, y);
        if x == 0 || y == 0 || x == width - 1 || y == height - 1 {
            return original;
        }

        let mut out = original;
        for c in 0..3 {
            let s = f32::from(smoothed_channel(image, x, y, c));
            let o = f32::from(original[c]);
            out[c] = (s + factor * (o - s)).round().clamp(0.0, 255.0) as u8;
        }
        out
    })
}

/// Rounded 3x3 weighted mean of one channel around an interior pixel
fn smoothed_channel(image: &RgbaImage, x: u32, y: u32, channel: usize) -> u8 {
    let mut sum = 0u32;
    for ny in y - 1..=y + 1 {
        for nx in x - 1..=x + 1 {
            let weight = if nx == x && ny == y { SMOOTH_CENTER_WEIGHT } else { 1 };
            sum += weight * u32::from(image.get_pixel(nx, ny)[channel]);
        }
    }
    ((sum + SMOOTH_KERNEL_SUM / 2) / SMOOTH_KERNEL_SUM) as u8
}

/// Paste `source` onto `target` at `(x, y)` using the source alpha as mask
///
/// Every channel, alpha included, is blended as
/// `src * a + dst * (255 - a)`. Parts falling outside the target are clipped.
pub fn paste_with_alpha_mask(target: &mut RgbaImage, source: &RgbaImage, x: i64, y: i64) {
    let (tw, th) = (i64::from(target.width()), i64::from(target.height()));

    for (sx, sy, src) in source.enumerate_pixels() {
        let tx = x + i64::from(sx);
        let ty = y + i64::from(sy);
        if tx < 0 || ty < 0 || tx >= tw || ty >= th {
            continue;
        }
        let mask = u32::from(src[3]);
        if mask == 0 {
            continue;
        }

        let dst = target.get_pixel_mut(tx as u32, ty as u32);
        if mask == 255 {
            *dst = *src;
            continue;
        }
        let mut blended = [0u8; 4];
        for (c, value) in blended.iter_mut().enumerate() {
            let s = u32::from(src[c]);
            let d = u32::from(dst[c]);
            *value = ((s * mask + d * (255 - mask) + 127) / 255) as u8;
        }
        *dst = Rgba(blended);
    }
}
