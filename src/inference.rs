//! Subject extractor abstraction
//!
//! The segmentation model is an opaque collaborator: it receives an RGBA
//! image and returns an equally sized RGBA image whose background pixels are
//! fully transparent.

use crate::{config::ProcessorConfig, error::Result};
use image::RgbaImage;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for subject extraction backends
pub trait SubjectExtractor: Send {
    /// Prepare the extractor (load the model); a no-op once initialized
    ///
    /// Returns the time spent loading, or `None` when nothing had to be done.
    ///
    /// # Errors
    /// - Model file missing or invalid
    /// - Runtime initialization failures
    fn initialize(&mut self, config: &ProcessorConfig) -> Result<Option<Duration>>;

    /// Cut the subject out of `image`
    ///
    /// # Errors
    /// - Extractor not initialized
    /// - Inference failures
    fn extract(&mut self, image: &RgbaImage) -> Result<RgbaImage>;

    /// Short identifier used in logs and the health payload
    fn name(&self) -> &'static str;

    /// Check if the extractor is initialized
    fn is_initialized(&self) -> bool;
}
