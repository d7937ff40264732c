//! Output encoding service
//!
//! PNG goes through the `image` crate, WebP through libwebp so quality,
//! method and a lossless alpha plane can be controlled.

use crate::{
    config::OutputFormat,
    error::{BottleError, Result},
};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

/// Service for encoding the final canvas
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode an RGBA canvas
    ///
    /// `quality` (0-100) and `method` (0-6) only affect WebP.
    ///
    /// # Errors
    /// - [`BottleError::Encoding`] when the encoder rejects the image
    pub fn encode(image: &RgbaImage, format: OutputFormat, quality: u8, method: u8) -> Result<Vec<u8>> {
        match format {
            OutputFormat::Png => Self::encode_png(image),
            OutputFormat::WebP => Self::encode_webp(image, quality, method),
        }
    }

    fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| BottleError::encoding(format!("PNG encoding failed: {e}")))?;
        Ok(buffer.into_inner())
    }

    fn encode_webp(image: &RgbaImage, quality: u8, method: u8) -> Result<Vec<u8>> {
        let (width, height) = image.dimensions();
        let encoder = webp::Encoder::from_rgba(image.as_raw(), width, height);

        let mut config = webp::WebPConfig::new()
            .map_err(|()| BottleError::encoding("Failed to initialize WebP configuration"))?;
        config.lossless = 0;
        config.quality = f32::from(quality.min(100));
        config.method = i32::from(method.min(6));
        // Keep the alpha plane lossless so cut-out edges survive intact
        config.alpha_quality = 100;

        let encoded = encoder
            .encode_advanced(&config)
            .map_err(|e| BottleError::encoding(format!("WebP encoding failed: {e:?}")))?;
        Ok(encoded.to_vec())
    }

    /// Get the file extension for an output format (without the dot)
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::WebP => "webp",
        }
    }

    /// MIME type for an output format
    #[must_use]
    pub fn content_type(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "image/png",
            OutputFormat::WebP => "image/webp",
        }
    }

    /// Decode previously encoded output, mainly for verification
    ///
    /// # Errors
    /// - [`BottleError::Decode`] when the bytes are not a PNG or WebP image
    pub fn decode(bytes: &[u8], format: OutputFormat) -> Result<RgbaImage> {
        match format {
            OutputFormat::Png => image::load_from_memory_with_format(bytes, ImageFormat::Png)
                .map(DynamicImage::into_rgba8)
                .map_err(|e| BottleError::decode(format!("Invalid PNG output: {e}"))),
            OutputFormat::WebP => webp::Decoder::new(bytes)
                .decode()
                .map(|decoded| decoded.to_image().into_rgba8())
                .ok_or_else(|| BottleError::decode("Invalid WebP output")),
        }
    }
}
