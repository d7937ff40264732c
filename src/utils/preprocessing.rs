//! Tensor conversion for U2-Net style salient-object models
//!
//! Input: the whole image squashed to a square, scaled by its brightest
//! channel value and normalized with ImageNet statistics (NCHW).
//! Output: a single-channel saliency map, min-max normalized and resized
//! back to the source size to be used as alpha.

use crate::error::{BottleError, Result};
use image::{imageops::FilterType, GrayImage, Luma, RgbaImage};
use ndarray::Array4;

/// Model input parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Side of the square model input
    pub target_size: u32,
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            target_size: 320,
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
        }
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Build the `1x3xNxN` model input tensor
    ///
    /// # Errors
    /// - Empty image or zero target size
    pub fn to_tensor(image: &RgbaImage, config: &PreprocessingConfig) -> Result<Array4<f32>> {
        if image.width() == 0 || image.height() == 0 || config.target_size == 0 {
            return Err(BottleError::processing_stage_error(
                "preprocessing",
                "image and model input must be non-empty",
                Some(&format!(
                    "{}x{} -> {}",
                    image.width(),
                    image.height(),
                    config.target_size
                )),
            ));
        }

        let size = config.target_size;
        let resized = image::imageops::resize(image, size, size, FilterType::Lanczos3);

        let max_value = resized
            .pixels()
            .flat_map(|p| [p[0], p[1], p[2]])
            .max()
            .unwrap_or(0);
        let scale = if max_value == 0 { 1.0 } else { f32::from(max_value) };

        let side = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                let value = f32::from(pixel[c]) / scale;
                let normalized = (value - config.normalization_mean[c]) / config.normalization_std[c];
                if let Some(slot) = tensor.get_mut([0, c, y as usize, x as usize]) {
                    *slot = normalized;
                }
            }
        }

        Ok(tensor)
    }

    /// Turn the first output channel into a `width x height` mask
    ///
    /// # Errors
    /// - Output tensor that is not `1x1xHxW` shaped (extra channels are ignored)
    pub fn tensor_to_mask(tensor: &Array4<f32>, width: u32, height: u32) -> Result<GrayImage> {
        let (batch, channels, rows, cols) = tensor.dim();
        if batch == 0 || channels == 0 || rows == 0 || cols == 0 {
            return Err(BottleError::extraction(format!(
                "Unexpected model output shape {:?}",
                tensor.dim()
            )));
        }

        let prediction = tensor.slice(ndarray::s![0, 0, .., ..]);
        let (min, max) = prediction
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = max - min;

        let mut mask = GrayImage::new(cols as u32, rows as u32);
        for ((row, col), &value) in prediction.indexed_iter() {
            let normalized = if range > f32::EPSILON { (value - min) / range } else { 0.0 };
            mask.put_pixel(col as u32, row as u32, Luma([(normalized * 255.0) as u8]));
        }

        if (mask.width(), mask.height()) == (width, height) {
            return Ok(mask);
        }
        Ok(image::imageops::resize(&mask, width, height, FilterType::Lanczos3))
    }

    /// Replace the image's alpha channel with `mask`
    ///
    /// # Errors
    /// - Mask and image dimensions differ
    pub fn apply_mask(image: &RgbaImage, mask: &GrayImage) -> Result<RgbaImage> {
        if image.dimensions() != mask.dimensions() {
            return Err(BottleError::extraction(format!(
                "Mask size {:?} does not match image size {:?}",
                mask.dimensions(),
                image.dimensions()
            )));
        }

        let mut output = image.clone();
        for (pixel, alpha) in output.pixels_mut().zip(mask.pixels()) {
            pixel[3] = alpha[0];
        }
        Ok(output)
    }
}
