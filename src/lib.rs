#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Bottle Studio
//!
//! Turns an arbitrary photo of a bottle into a standardized catalog image:
//! the bottle is cut out of its background, straightened, cropped to its
//! visible extent and composited onto a fixed-size transparent canvas with a
//! soft elliptical floor shadow.
//!
//! ## Pipeline
//!
//! 1. **Load / normalize**: decode, convert to RGBA, cap the input height
//! 2. **Extract**: a [`SubjectExtractor`] makes the background transparent
//! 3. **Straighten**: rotate by the tilt of the largest outer contour
//! 4. **Crop**: trim to the bounding box of visible pixels
//! 5. **Composite**: fit, sharpen, shadow, place on the canvas
//! 6. **Encode**: PNG, or WebP with alpha
//!
//! Straightening and cropping are best-effort: a degenerate mask leaves the
//! image unchanged and the outcome is reported in [`ProcessingResult`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bottle_studio::{BottleProcessor, ExtractorKind, ProcessorConfig, Profile};
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = ProcessorConfig::builder()
//!     .extractor(ExtractorKind::Passthrough)
//!     .build()?;
//! let mut processor = BottleProcessor::new(config)?;
//!
//! let result = processor.process_file("bottle.png")?;
//! result.save("bottle_studio.png")?;
//! println!("{}", result.timing_summary());
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx`: ONNX Runtime extractor for U2-Net family models
//! - `cli` (default): `bottle-studio` command-line tool
//! - `server` (default): HTTP service with `GET /` and `POST /process-bottle/`
//! - `webp-support` (default): WebP input decoding
//! - `tracing-json`: JSON log output for the CLI

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod imaging;
pub mod inference;
pub mod processor;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use tokio::io::AsyncRead;

// Public API exports
pub use backends::*;
pub use config::{
    CanvasConfig, ExecutionProvider, ExtractorKind, OutputFormat, ProcessorConfig,
    ProcessorConfigBuilder, Profile, ServerConfig,
};
pub use error::{BottleError, Result};
pub use inference::SubjectExtractor;
pub use processor::{BottleProcessor, DefaultExtractorFactory, ExtractorFactory};
pub use services::{ImageIOService, OutputFormatHandler};
pub use types::{
    BatchItem, BatchReport, BoundingBox, CompositeLayout, DegenerateMask, OrientedRect,
    ProcessingResult, ProcessingTimings, ShadowSpec, StageOutcome,
};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, spans, TracingConfig, TracingFormat};

/// Process one encoded photo with a fresh processor
///
/// Suited to one-off conversions. Services handling many photos should keep
/// a [`BottleProcessor`] alive so the extractor is loaded only once.
///
/// # Examples
///
/// ```rust,no_run
/// use bottle_studio::{process_bottle_bytes, ExtractorKind, ProcessorConfig};
///
/// # fn example(upload: Vec<u8>) -> anyhow::Result<()> {
/// let config = ProcessorConfig::builder()
///     .extractor(ExtractorKind::Passthrough)
///     .build()?;
/// let result = process_bottle_bytes(&upload, &config)?;
/// assert_eq!(result.content_type(), "image/png");
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - [`BottleError::Decode`] when the bytes are not a supported image
/// - Invalid configuration, extractor, compositing or encoding failures
pub fn process_bottle_bytes(image_bytes: &[u8], config: &ProcessorConfig) -> Result<ProcessingResult> {
    let mut processor = BottleProcessor::new(config.clone())?;
    processor.process_bytes(image_bytes)
}

/// Read a photo from an async reader and process it with a fresh processor
///
/// # Errors
/// - Read failures
/// - Same failures as [`process_bottle_bytes`]
pub async fn process_bottle_from_reader<R: AsyncRead + Unpin>(
    reader: R,
    config: &ProcessorConfig,
) -> Result<ProcessingResult> {
    let image = ImageIOService::load_from_reader(reader).await?;
    let mut processor = BottleProcessor::new(config.clone())?;
    processor.process_image(image)
}
