//! Mock extractors for testing the processor without a model file

use crate::{
    config::ProcessorConfig,
    error::{BottleError, Result},
    inference::SubjectExtractor,
};
use image::RgbaImage;
use instant::Duration;
use std::sync::{Arc, Mutex};

/// Keys out a near-white backdrop, like a studio photo through a real model
#[derive(Debug, Clone, Default)]
pub struct MockExtractor {
    initialized: bool,
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_init: bool,
    should_fail_extract: bool,
}

impl MockExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_failing_init() -> Self {
        Self {
            should_fail_init: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn new_failing_extract() -> Self {
        Self {
            should_fail_extract: true,
            ..Self::default()
        }
    }

    /// Shared handle to the recorded calls
    #[must_use]
    pub fn call_history(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    fn record(&self, call: String) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(call);
        }
    }
}

impl SubjectExtractor for MockExtractor {
    fn initialize(&mut self, _config: &ProcessorConfig) -> Result<Option<Duration>> {
        self.record("initialize".to_string());
        if self.should_fail_init {
            return Err(BottleError::model("mock initialization failure"));
        }
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn extract(&mut self, image: &RgbaImage) -> Result<RgbaImage> {
        self.record(format!("extract {}x{}", image.width(), image.height()));
        if !self.initialized {
            return Err(BottleError::extraction("mock extractor not initialized"));
        }
        if self.should_fail_extract {
            return Err(BottleError::extraction("mock extraction failure"));
        }

        let mut output = image.clone();
        for pixel in output.pixels_mut() {
            if pixel[0] > 240 && pixel[1] > 240 && pixel[2] > 240 {
                pixel[3] = 0;
            }
        }
        Ok(output)
    }

    fn name(&self) -> &'static str {
        "mock"
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
