//! Binary opacity mask derived from an alpha channel

use image::{GrayImage, Luma, RgbaImage};

/// `mask(x, y)` is set when the pixel's alpha exceeds the threshold
///
/// Stored as a `GrayImage` holding 255 for set pixels so it can be fed
/// straight into `imageproc` contour tracing.
#[derive(Debug, Clone)]
pub struct OpacityMask {
    pixels: GrayImage,
    count: usize,
}

impl OpacityMask {
    #[must_use]
    pub fn from_rgba(image: &RgbaImage, threshold: u8) -> Self {
        let mut count = 0;
        let pixels = GrayImage::from_fn(image.width(), image.height(), |x, y| {
            if image.get_pixel(x, y)[3] > threshold {
                count += 1;
                Luma([255])
            } else {
                Luma([0])
            }
        });
        Self { pixels, count }
    }

    /// Number of set pixels
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.pixels
            .get_pixel_checked(x, y)
            .is_some_and(|p| p[0] != 0)
    }

    #[must_use]
    pub fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }

    /// Copy of the mask inside a one pixel unset border
    ///
    /// Contour tracing only starts an outer border next to an unset pixel,
    /// so subjects touching the image edge need the frame to read as
    /// background. Coordinates in the result are shifted by `(1, 1)`.
    #[must_use]
    pub fn with_empty_border(&self) -> GrayImage {
        let mut framed = GrayImage::new(self.pixels.width() + 2, self.pixels.height() + 2);
        image::imageops::replace(&mut framed, &self.pixels, 1, 1);
        framed
    }
}
