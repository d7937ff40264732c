//! Extractor that trusts the input's own alpha channel
//!
//! Used for subjects that were cut out upstream and for deployments
//! without a segmentation model.

use crate::{config::ProcessorConfig, error::Result, inference::SubjectExtractor};
use image::RgbaImage;
use instant::Duration;

#[derive(Debug, Default)]
pub struct PassthroughExtractor {
    initialized: bool,
}

impl PassthroughExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SubjectExtractor for PassthroughExtractor {
    fn initialize(&mut self, _config: &ProcessorConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(0)))
    }

    fn extract(&mut self, image: &RgbaImage) -> Result<RgbaImage> {
        Ok(image.clone())
    }

    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
