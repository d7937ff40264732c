//! Input normalizer: RGBA conversion and the input size guard

use image::{imageops::FilterType, DynamicImage, RgbaImage};

/// Convert to RGBA and downscale when taller than `max_height`
///
/// The aspect ratio is kept: the new width is `round(width * max / height)`,
/// never less than one pixel.
#[must_use]
pub fn normalize_input(image: DynamicImage, max_height: Option<u32>) -> RgbaImage {
    let rgba = match image {
        DynamicImage::ImageRgba8(buffer) => buffer,
        other => other.to_rgba8(),
    };

    let (width, height) = rgba.dimensions();
    match max_height {
        Some(max) if max > 0 && height > max => {
            let new_width = ((f64::from(width) * f64::from(max) / f64::from(height)).round() as u32).max(1);
            log::debug!("Downscaling input from {width}x{height} to {new_width}x{max}");
            image::imageops::resize(&rgba, new_width, max, FilterType::Lanczos3)
        },
        _ => rgba,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_small_input_is_converted_only() {
        let image = RgbImage::from_pixel(40, 30, Rgb([10, 20, 30]));
        let rgba = normalize_input(DynamicImage::ImageRgb8(image), Some(1000));
        assert_eq!(rgba.dimensions(), (40, 30));
        assert_eq!(rgba.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_tall_input_is_downscaled() {
        let image = RgbImage::new(1200, 2000);
        let rgba = normalize_input(DynamicImage::ImageRgb8(image), Some(1000));
        assert_eq!(rgba.dimensions(), (600, 1000));

        let odd = RgbImage::new(333, 1001);
        let rgba = normalize_input(DynamicImage::ImageRgb8(odd), Some(1000));
        assert_eq!(rgba.dimensions(), (333, 1000));
    }

    #[test]
    fn test_guard_disabled() {
        let image = RgbImage::new(10, 3000);
        let rgba = normalize_input(DynamicImage::ImageRgb8(image), None);
        assert_eq!(rgba.dimensions(), (10, 3000));
    }

    #[test]
    fn test_extreme_aspect_keeps_one_pixel() {
        let image = RgbImage::new(1, 5000);
        let rgba = normalize_input(DynamicImage::ImageRgb8(image), Some(800));
        assert_eq!(rgba.dimensions(), (1, 800));
    }
}
