//! Unified bottle processor
//!
//! `BottleProcessor` owns the configuration and the subject extractor and
//! runs the five stages in order: load, extract, orient, crop, composite.
//! It is used by both the CLI and the HTTP server so every surface produces
//! identical output.

use crate::{
    config::{ExtractorKind, ProcessorConfig},
    error::{BottleError, Result},
    imaging::{compose, crop_to_content, normalize_input, normalize_orientation},
    inference::SubjectExtractor,
    services::{ImageIOService, OutputFormatHandler},
    types::{BatchItem, BatchReport, ProcessingResult, ProcessingTimings, StageOutcome},
};
use image::DynamicImage;
use instant::Instant;
use log::{debug, info, warn};
use std::path::Path;
use tracing::{debug as trace_debug, instrument, span, Level};

/// Factory trait for creating subject extractors
pub trait ExtractorFactory: Send + Sync {
    /// Create an extractor of the requested kind
    ///
    /// # Errors
    /// - Extractor kind not compiled into this build
    fn create_extractor(&self, kind: ExtractorKind) -> Result<Box<dyn SubjectExtractor>>;

    /// List extractor kinds this factory can build
    fn available_extractors(&self) -> Vec<ExtractorKind>;
}

/// Default factory: ONNX (when compiled in) and passthrough
pub struct DefaultExtractorFactory;

impl ExtractorFactory for DefaultExtractorFactory {
    fn create_extractor(&self, kind: ExtractorKind) -> Result<Box<dyn SubjectExtractor>> {
        match kind {
            #[cfg(feature = "onnx")]
            ExtractorKind::Onnx => Ok(Box::new(crate::backends::OnnxExtractor::new())),
            #[cfg(not(feature = "onnx"))]
            ExtractorKind::Onnx => Err(BottleError::invalid_config(
                "ONNX extractor not available: build with the `onnx` feature",
            )),
            ExtractorKind::Passthrough => Ok(Box::new(crate::backends::PassthroughExtractor::new())),
        }
    }

    fn available_extractors(&self) -> Vec<ExtractorKind> {
        let mut kinds = Vec::new();
        if cfg!(feature = "onnx") {
            kinds.push(ExtractorKind::Onnx);
        }
        kinds.push(ExtractorKind::Passthrough);
        kinds
    }
}

/// Processor running the full bottle pipeline
pub struct BottleProcessor {
    config: ProcessorConfig,
    extractor_factory: Box<dyn ExtractorFactory>,
    extractor: Option<Box<dyn SubjectExtractor>>,
    /// Model load time not yet reported in a result
    pending_model_load_ms: Option<u64>,
}

impl std::fmt::Debug for BottleProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BottleProcessor")
            .field("config", &self.config)
            .field("extractor", &self.extractor.as_ref().map(|e| e.name()))
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl BottleProcessor {
    /// Create a processor with the default extractor factory
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Model loading failures when `eager_model_load` is set
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        Self::with_factory(config, Box::new(DefaultExtractorFactory))
    }

    /// Create a processor with a custom extractor factory
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Model loading failures when `eager_model_load` is set
    pub fn with_factory(config: ProcessorConfig, extractor_factory: Box<dyn ExtractorFactory>) -> Result<Self> {
        config.validate()?;
        let mut processor = Self {
            config,
            extractor_factory,
            extractor: None,
            pending_model_load_ms: None,
        };
        if processor.config.eager_model_load {
            processor.initialize()?;
        }
        Ok(processor)
    }

    /// Create a processor around an already constructed extractor
    ///
    /// The extractor is still initialized lazily (or eagerly, per config).
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Extractor initialization failures when `eager_model_load` is set
    pub fn with_extractor(config: ProcessorConfig, extractor: Box<dyn SubjectExtractor>) -> Result<Self> {
        config.validate()?;
        let mut processor = Self {
            config,
            extractor_factory: Box::new(DefaultExtractorFactory),
            extractor: Some(extractor),
            pending_model_load_ms: None,
        };
        if processor.config.eager_model_load {
            processor.initialize()?;
        }
        Ok(processor)
    }

    /// Create and initialize the extractor; a no-op once done
    ///
    /// # Errors
    /// - Extractor kind unavailable in this build
    /// - Model loading failures
    pub fn initialize(&mut self) -> Result<()> {
        if self.is_initialized() {
            return Ok(());
        }

        info!("Initializing bottle processor");
        debug!("Profile: {}", self.config.profile);
        debug!("Extractor: {}", self.config.extractor);
        debug!("Execution provider: {}", self.config.execution_provider);

        let mut extractor = match self.extractor.take() {
            Some(extractor) => extractor,
            None => self.extractor_factory.create_extractor(self.config.extractor)?,
        };

        let load_result = {
            let _span = span!(Level::INFO, "model_loading", extractor = %extractor.name()).entered();
            extractor.initialize(&self.config)
        };
        // Keep the extractor even on failure so a later call can retry
        let name = extractor.name();
        self.extractor = Some(extractor);
        let load_time = load_result?;

        self.pending_model_load_ms = load_time.map(|d| d.as_millis() as u64);
        info!("Bottle processor initialized ({name})");
        Ok(())
    }

    /// Decode and process an encoded image
    ///
    /// # Errors
    /// - [`BottleError::Decode`] for bytes that are not a supported image
    /// - Extraction, compositing or encoding failures
    pub fn process_bytes(&mut self, image_bytes: &[u8]) -> Result<ProcessingResult> {
        let decode_start = Instant::now();
        let image = ImageIOService::load_from_bytes(image_bytes)?;
        let decode_ms = elapsed_ms(decode_start);
        self.run_pipeline(image, decode_ms, decode_start)
    }

    /// Read, decode and process an image file
    ///
    /// # Errors
    /// - File system errors
    /// - Same failures as [`Self::process_bytes`]
    pub fn process_file<P: AsRef<Path>>(&mut self, input_path: P) -> Result<ProcessingResult> {
        let decode_start = Instant::now();
        let image = ImageIOService::load_image(input_path)?;
        let decode_ms = elapsed_ms(decode_start);
        self.run_pipeline(image, decode_ms, decode_start)
    }

    /// Process an already decoded image
    ///
    /// # Errors
    /// - Extraction, compositing or encoding failures
    pub fn process_image(&mut self, image: DynamicImage) -> Result<ProcessingResult> {
        self.run_pipeline(image, 0, Instant::now())
    }

    /// Process named encoded images one after another
    ///
    /// A failing item never stops the batch; each item carries its own result.
    pub fn process_batch<I, S>(&mut self, items: I) -> BatchReport
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: Into<String>,
    {
        let mut report = BatchReport::default();
        for (name, bytes) in items {
            let name = name.into();
            let result = self.process_bytes(&bytes);
            log_item_outcome(&name, &result);
            report.items.push(BatchItem { name, result });
        }
        info!(
            "Batch complete: {} succeeded, {} failed",
            report.success_count(),
            report.failure_count()
        );
        report
    }

    /// Process image files one after another, isolating failures per file
    pub fn process_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> BatchReport {
        let _span = span!(Level::INFO, "batch_processing", file_count = %paths.len()).entered();
        let mut report = BatchReport::default();
        for path in paths {
            let path = path.as_ref();
            let name = path.display().to_string();
            let result = self.process_file(path);
            log_item_outcome(&name, &result);
            report.items.push(BatchItem { name, result });
        }
        report
    }

    #[instrument(
        skip(self, image, decode_ms, total_start),
        fields(
            profile = %self.config.profile,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    fn run_pipeline(&mut self, image: DynamicImage, decode_ms: u64, total_start: Instant) -> Result<ProcessingResult> {
        self.initialize()?;

        let mut timings = ProcessingTimings {
            decode_ms,
            ..ProcessingTimings::default()
        };

        let guard_start = Instant::now();
        let input = normalize_input(image, self.config.max_input_height);
        timings.decode_ms += elapsed_ms(guard_start);
        let input_dimensions = input.dimensions();

        let extracted = {
            let _span = span!(
                Level::INFO,
                "extraction",
                width = %input_dimensions.0,
                height = %input_dimensions.1
            )
            .entered();
            let start = Instant::now();
            let extractor = self
                .extractor
                .as_mut()
                .ok_or_else(|| BottleError::extraction("Extractor not initialized"))?;
            let extracted = extractor.extract(&input)?;
            timings.extraction_ms = elapsed_ms(start);
            extracted
        };
        if extracted.dimensions() != input_dimensions {
            return Err(BottleError::extraction(format!(
                "Extractor returned {:?} for a {:?} input",
                extracted.dimensions(),
                input_dimensions
            )));
        }

        let (oriented, orientation) = {
            let _span = span!(Level::DEBUG, "orientation").entered();
            let start = Instant::now();
            let result = if self.config.straighten {
                normalize_orientation(
                    DynamicImage::ImageRgba8(extracted),
                    self.config.orientation_threshold,
                    f64::from(self.config.max_tilt_degrees),
                )
            } else {
                (DynamicImage::ImageRgba8(extracted), StageOutcome::Unchanged)
            };
            timings.orientation_ms = elapsed_ms(start);
            result
        };
        trace_debug!(outcome = %orientation.label(), "orientation stage finished");

        let (cropped, crop) = {
            let _span = span!(Level::DEBUG, "crop").entered();
            let start = Instant::now();
            let result = crop_to_content(oriented, self.config.crop_threshold);
            timings.crop_ms = elapsed_ms(start);
            result
        };
        trace_debug!(outcome = %crop.label(), "crop stage finished");

        let (canvas, layout) = {
            let _span = span!(Level::DEBUG, "composite").entered();
            let start = Instant::now();
            let result = compose(&cropped.into_rgba8(), &self.config.canvas)?;
            timings.composite_ms = elapsed_ms(start);
            result
        };

        let data = {
            let _span = span!(Level::DEBUG, "encode", format = %self.config.output_format).entered();
            let start = Instant::now();
            let data = OutputFormatHandler::encode(
                &canvas,
                self.config.output_format,
                self.config.webp_quality,
                self.config.webp_method,
            )?;
            timings.encode_ms = elapsed_ms(start);
            data
        };

        timings.model_load_ms = self.pending_model_load_ms.take();
        timings.total_ms = elapsed_ms(total_start) + timings.model_load_ms.unwrap_or(0);

        let result = ProcessingResult {
            data,
            format: self.config.output_format,
            dimensions: canvas.dimensions(),
            orientation,
            crop,
            layout,
            timings,
        };
        if self.config.debug {
            debug!("{}", result.timing_summary());
        }
        Ok(result)
    }

    /// Get the current configuration
    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Check if the extractor is ready
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.extractor.as_ref().is_some_and(|e| e.is_initialized())
    }

    /// Name of the active extractor, or the configured kind before initialization
    #[must_use]
    pub fn extractor_name(&self) -> String {
        self.extractor
            .as_ref()
            .map_or_else(|| self.config.extractor.to_string(), |e| e.name().to_string())
    }

    /// List extractor kinds available in this build
    #[must_use]
    pub fn available_extractors(&self) -> Vec<ExtractorKind> {
        self.extractor_factory.available_extractors()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn log_item_outcome(name: &str, result: &Result<ProcessingResult>) {
    match result {
        Ok(r) => debug!("Processed {name}: {}", r.timing_summary()),
        Err(e) => warn!("Failed to process {name}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockExtractor;
    use crate::config::{OutputFormat, Profile};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    /// Dark bottle-shaped block on a white studio backdrop
    fn studio_photo(width: u32, height: u32) -> DynamicImage {
        let image = RgbImage::from_fn(width, height, |x, y| {
            let inside = x > width / 3 && x < 2 * width / 3 && y > height / 6 && y < 5 * height / 6;
            if inside {
                Rgb([30, 90, 40])
            } else {
                Rgb([255, 255, 255])
            }
        });
        DynamicImage::ImageRgb8(image)
    }

    fn encode(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, format).unwrap();
        buffer.into_inner()
    }

    fn mock_processor(config: ProcessorConfig) -> BottleProcessor {
        BottleProcessor::with_extractor(config, Box::new(MockExtractor::new())).unwrap()
    }

    #[test]
    fn test_lazy_initialization() {
        let mock = MockExtractor::new();
        let history = mock.call_history();
        let mut processor = BottleProcessor::with_extractor(ProcessorConfig::default(), Box::new(mock)).unwrap();

        assert!(!processor.is_initialized());
        assert!(history.lock().unwrap().is_empty());

        let bytes = encode(&studio_photo(120, 200), ImageFormat::Png);
        let first = processor.process_bytes(&bytes).unwrap();
        assert!(processor.is_initialized());
        assert!(first.timings.model_load_ms.is_some());

        let second = processor.process_bytes(&bytes).unwrap();
        assert!(second.timings.model_load_ms.is_none());

        let calls = history.lock().unwrap();
        assert_eq!(calls.iter().filter(|c| *c == "initialize").count(), 1);
    }

    #[test]
    fn test_eager_initialization() {
        let config = ProcessorConfig::builder().eager_model_load(true).build().unwrap();
        let processor = mock_processor(config);
        assert!(processor.is_initialized());

        let config = ProcessorConfig::builder().eager_model_load(true).build().unwrap();
        let result = BottleProcessor::with_extractor(config, Box::new(MockExtractor::new_failing_init()));
        assert!(result.is_err());
    }

    #[test]
    fn test_full_pipeline_png() {
        let mut processor = mock_processor(ProcessorConfig::default());
        let bytes = encode(&studio_photo(150, 300), ImageFormat::Jpeg);
        let result = processor.process_bytes(&bytes).unwrap();

        assert_eq!(result.format, OutputFormat::Png);
        assert_eq!(result.dimensions, (555, 555));
        assert_eq!(result.content_type(), "image/png");
        assert!(result.crop.is_applied());

        let decoded = OutputFormatHandler::decode(&result.data, OutputFormat::Png).unwrap();
        assert_eq!(decoded.dimensions(), (555, 555));
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
        let (cx, cy) = (
            (result.layout.subject_x + i64::from(result.layout.subject_width) / 2) as u32,
            (result.layout.subject_y + i64::from(result.layout.subject_height) / 2) as u32,
        );
        assert_eq!(decoded.get_pixel(cx, cy)[3], 255);
    }

    #[test]
    fn test_high_res_profile_webp() {
        let config = ProcessorConfig::from_profile(Profile::HighRes);
        let mut processor = mock_processor(config);
        let result = processor.process_image(studio_photo(200, 400)).unwrap();

        assert_eq!(result.format, OutputFormat::WebP);
        assert_eq!(result.dimensions, (1200, 1200));
        assert_eq!(&result.data[0..4], b"RIFF");
        assert_eq!(result.layout.floor_y, 1100);
    }

    #[test]
    fn test_decode_error_is_client_error() {
        let mut processor = mock_processor(ProcessorConfig::default());
        let err = processor.process_bytes(b"this is not an image").unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_extraction_failure_propagates() {
        let mut processor =
            BottleProcessor::with_extractor(ProcessorConfig::default(), Box::new(MockExtractor::new_failing_extract()))
                .unwrap();
        let err = processor.process_image(studio_photo(50, 80)).unwrap_err();
        assert!(matches!(err, BottleError::Extraction(_)));
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_fully_transparent_subject_still_composites() {
        let mut processor = mock_processor(ProcessorConfig::default());
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(40, 60, Rgb([255, 255, 255])));
        let result = processor.process_image(white).unwrap();

        assert!(result.orientation.is_fallback());
        assert!(result.crop.is_fallback());
        assert_eq!(result.dimensions, (555, 555));
    }

    #[test]
    fn test_straighten_disabled() {
        let config = ProcessorConfig::builder().straighten(false).build().unwrap();
        let mut processor = mock_processor(config);
        let result = processor.process_image(studio_photo(90, 180)).unwrap();
        assert_eq!(result.orientation, StageOutcome::Unchanged);
    }

    #[test]
    fn test_input_guard_downscales() {
        let config = ProcessorConfig::builder().max_input_height(Some(100)).build().unwrap();
        let mock = MockExtractor::new();
        let history = mock.call_history();
        let mut processor = BottleProcessor::with_extractor(config, Box::new(mock)).unwrap();
        processor.process_image(studio_photo(100, 400)).unwrap();

        let calls = history.lock().unwrap();
        assert!(calls.iter().any(|c| c == "extract 25x100"));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let mut processor = mock_processor(ProcessorConfig::default());
        let good = encode(&studio_photo(60, 120), ImageFormat::Png);
        let items = vec![
            ("a.png", good.clone()),
            ("broken.jpg", b"corrupt".to_vec()),
            ("c.png", good),
        ];

        let report = processor.process_batch(items);
        assert_eq!(report.items.len(), 3);
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.failures()[0].0, "broken.jpg");
    }

    #[test]
    fn test_default_factory() {
        let factory = DefaultExtractorFactory;
        assert!(factory.available_extractors().contains(&ExtractorKind::Passthrough));
        let extractor = factory.create_extractor(ExtractorKind::Passthrough).unwrap();
        assert_eq!(extractor.name(), "passthrough");

        #[cfg(not(feature = "onnx"))]
        assert!(factory.create_extractor(ExtractorKind::Onnx).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ProcessorConfig::default();
        config.canvas.shadow_opacity = 2.0;
        assert!(BottleProcessor::new(config).is_err());
    }

    #[test]
    fn test_extractor_name() {
        let config = ProcessorConfig::builder()
            .extractor(ExtractorKind::Passthrough)
            .build()
            .unwrap();
        let mut processor = BottleProcessor::new(config).unwrap();
        assert_eq!(processor.extractor_name(), "passthrough");
        processor.initialize().unwrap();
        assert_eq!(processor.extractor_name(), "passthrough");
        assert!(processor.is_initialized());
    }
}
