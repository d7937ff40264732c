//! Image input service
//!
//! Decoding and file discovery live here so the processor only deals with
//! decoded pixels.

use crate::error::{BottleError, Result};
use image::DynamicImage;
use std::path::Path;

/// Extensions accepted when scanning directories
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "tiff", "tif"];

/// Service for handling image input operations
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an image from raw bytes
    ///
    /// The format is detected from the content, not from any file name.
    ///
    /// # Errors
    /// - [`BottleError::Decode`] when the bytes are empty or not a supported image
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(BottleError::decode("empty input"));
        }
        image::load_from_memory(bytes)
            .map_err(|e| BottleError::decode(format!("Failed to decode image from bytes: {e}")))
    }

    /// Read and decode an image file
    ///
    /// # Errors
    /// - File system errors while reading
    /// - [`BottleError::Decode`] when the content is not a supported image
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        let data = std::fs::read(path_ref)
            .map_err(|e| BottleError::file_io_error("read image file", path_ref, &e))?;

        Self::load_from_bytes(&data).map_err(|e| match e {
            BottleError::Decode(msg) => {
                BottleError::decode(format!("{} ({})", msg, path_ref.display()))
            },
            other => other,
        })
    }

    /// Load an image from an async reader
    ///
    /// # Errors
    /// - Read failures on the stream
    /// - [`BottleError::Decode`] when the content is not a supported image
    pub async fn load_from_reader<R: tokio::io::AsyncRead + Unpin>(mut reader: R) -> Result<DynamicImage> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer).await?;
        Self::load_from_bytes(&buffer)
    }

    /// Check if a file path has a supported image extension
    pub fn is_supported_format<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                let ext_lower = ext.to_lowercase();
                SUPPORTED_EXTENSIONS.contains(&ext_lower.as_str())
            })
    }
}
