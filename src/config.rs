//! Configuration types for the bottle processing pipeline
//!
//! Every deployment constant (canvas size, padding, shadow geometry, sharpening,
//! output encoding, input size guard) lives in one of the structures below.
//! The observed deployments are available as [`Profile`]s.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// Lossless PNG with alpha channel
    #[default]
    Png,
    /// Lossy WebP with a lossless alpha plane
    WebP,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "png"),
            Self::WebP => write!(f, "webp"),
        }
    }
}

/// Which subject extractor the processor should build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractorKind {
    /// U2-Net family model through ONNX Runtime
    Onnx,
    /// Keep the input's own alpha channel (pre-cut subjects, no model)
    Passthrough,
}

impl Default for ExtractorKind {
    fn default() -> Self {
        if cfg!(feature = "onnx") {
            Self::Onnx
        } else {
            Self::Passthrough
        }
    }
}

impl std::fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Passthrough => write!(f, "passthrough"),
        }
    }
}

/// Compositor constants for one canvas resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// Canvas width in pixels
    pub target_width: u32,
    /// Canvas height in pixels
    pub target_height: u32,
    /// Total horizontal margin reserved around the subject
    pub pad_width: u32,
    /// Total vertical margin reserved around the subject
    pub pad_height: u32,
    /// Distance from the canvas bottom to the floor line
    pub bottom_margin: u32,
    /// How far the subject's base sinks below the floor line
    pub vertical_offset: i32,
    /// Sharpness enhancement factor (1.0 = unchanged)
    pub sharpen_factor: f32,
    /// Gaussian blur radius applied to the shadow ellipse
    pub shadow_blur_radius: f32,
    /// Alpha multiplier applied to the blurred shadow, in [0, 1]
    pub shadow_opacity: f32,
    /// Shadow width relative to the resized subject width
    pub shadow_width_ratio: f64,
    /// Shadow height relative to the resized subject width
    pub shadow_height_ratio: f64,
}

impl CanvasConfig {
    /// Canvas constants of the 555px deployments
    #[must_use]
    pub fn standard() -> Self {
        Self {
            target_width: 555,
            target_height: 555,
            pad_width: 80,
            pad_height: 120,
            bottom_margin: 50,
            vertical_offset: 5,
            sharpen_factor: 1.5,
            shadow_blur_radius: 15.0,
            shadow_opacity: 0.85,
            shadow_width_ratio: 1.2,
            shadow_height_ratio: 0.25,
        }
    }

    /// Canvas constants of the 1200px deployments
    #[must_use]
    pub fn high_res() -> Self {
        Self {
            target_width: 1200,
            target_height: 1200,
            pad_width: 200,
            pad_height: 250,
            bottom_margin: 100,
            vertical_offset: 10,
            sharpen_factor: 1.3,
            shadow_blur_radius: 30.0,
            shadow_opacity: 0.85,
            shadow_width_ratio: 1.2,
            shadow_height_ratio: 0.25,
        }
    }

    /// Derive canvas constants for an arbitrary canvas size
    ///
    /// Starts from the observed profile closest to the requested size and
    /// scales padding, floor margin, overlap and blur proportionally. The
    /// sharpening factor and shadow opacity are copied unchanged. Requesting
    /// 555x555 or 1200x1200 reproduces the observed profiles exactly.
    #[must_use]
    pub fn for_size(target_width: u32, target_height: u32) -> Self {
        let standard = Self::standard();
        let high_res = Self::high_res();
        let midpoint = (standard.target_width + high_res.target_width) / 2;
        let base = if target_width.max(target_height) > midpoint {
            high_res
        } else {
            standard
        };

        let fw = f64::from(target_width) / f64::from(base.target_width);
        let fh = f64::from(target_height) / f64::from(base.target_height);
        let scale_u32 = |value: u32, factor: f64| (f64::from(value) * factor).round() as u32;

        Self {
            target_width,
            target_height,
            pad_width: scale_u32(base.pad_width, fw),
            pad_height: scale_u32(base.pad_height, fh),
            bottom_margin: scale_u32(base.bottom_margin, fh),
            vertical_offset: (f64::from(base.vertical_offset) * fh).round() as i32,
            shadow_blur_radius: (f64::from(base.shadow_blur_radius) * (fw + fh) / 2.0) as f32,
            ..base
        }
    }

    /// Validate the canvas constants
    ///
    /// # Errors
    /// - Padding or floor margin that leaves no room for the subject
    /// - Opacity outside [0, 1], negative blur or sharpening, non-positive ratios
    pub fn validate(&self) -> crate::Result<()> {
        use crate::error::BottleError;

        if self.target_width == 0 || self.target_height == 0 {
            return Err(BottleError::invalid_config(format!(
                "Canvas must have positive dimensions, got {}x{}",
                self.target_width, self.target_height
            )));
        }
        if self.pad_width >= self.target_width {
            return Err(BottleError::config_value_error(
                "horizontal padding",
                self.pad_width,
                &format!("0-{}", self.target_width - 1),
                None,
            ));
        }
        if self.pad_height >= self.target_height {
            return Err(BottleError::config_value_error(
                "vertical padding",
                self.pad_height,
                &format!("0-{}", self.target_height - 1),
                None,
            ));
        }
        if self.bottom_margin >= self.target_height {
            return Err(BottleError::config_value_error(
                "bottom margin",
                self.bottom_margin,
                &format!("0-{}", self.target_height - 1),
                None,
            ));
        }
        if !(0.0..=1.0).contains(&self.shadow_opacity) {
            return Err(BottleError::config_value_error(
                "shadow opacity",
                self.shadow_opacity,
                "0.0-1.0",
                Some(0.85),
            ));
        }
        if self.shadow_blur_radius < 0.0 || !self.shadow_blur_radius.is_finite() {
            return Err(BottleError::invalid_config(format!(
                "Shadow blur radius must be a non-negative number, got {}",
                self.shadow_blur_radius
            )));
        }
        if self.sharpen_factor < 0.0 || !self.sharpen_factor.is_finite() {
            return Err(BottleError::invalid_config(format!(
                "Sharpen factor must be a non-negative number, got {}",
                self.sharpen_factor
            )));
        }
        if self.shadow_width_ratio <= 0.0 || self.shadow_height_ratio <= 0.0 {
            return Err(BottleError::invalid_config(
                "Shadow ratios must be positive",
            ));
        }
        Ok(())
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Deployment profiles observed in production
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Profile {
    /// 555px PNG output, inputs capped at 1000px height
    #[default]
    Standard,
    /// 555px PNG output for memory-constrained hosts: 800px cap, small model
    Lean,
    /// 1200px WebP output, inputs capped at 1600px height
    HighRes,
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Lean => write!(f, "lean"),
            Self::HighRes => write!(f, "high-res"),
        }
    }
}

impl std::str::FromStr for Profile {
    type Err = crate::error::BottleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "555" => Ok(Self::Standard),
            "lean" => Ok(Self::Lean),
            "high-res" | "highres" | "hires" | "1200" => Ok(Self::HighRes),
            other => Err(crate::error::BottleError::invalid_config(format!(
                "Unknown profile '{other}' (expected standard, lean or high-res)"
            ))),
        }
    }
}

/// Default U2-Net variant for full-size deployments
pub const DEFAULT_MODEL_NAME: &str = "u2net";

/// Smaller U2-Net variant used by memory-constrained deployments
pub const LEAN_MODEL_NAME: &str = "u2netp";

/// Complete configuration for one [`crate::BottleProcessor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProcessorConfig {
    /// Profile the configuration was derived from
    pub profile: Profile,
    /// Compositor constants
    pub canvas: CanvasConfig,
    /// Inputs taller than this are downscaled before extraction (`None` disables)
    pub max_input_height: Option<u32>,
    /// Run the orientation normalizer
    pub straighten: bool,
    /// Alpha threshold for the orientation mask (`alpha > threshold`)
    pub orientation_threshold: u8,
    /// Detected tilts beyond this many degrees are treated as noise
    pub max_tilt_degrees: f32,
    /// Alpha threshold for the bounding cropper (`alpha > threshold`)
    pub crop_threshold: u8,
    /// Output encoding
    pub output_format: OutputFormat,
    /// WebP quality (0-100, only used for WebP output)
    pub webp_quality: u8,
    /// WebP compression effort (0-6, only used for WebP output)
    pub webp_method: u8,
    /// Subject extractor to build
    pub extractor: ExtractorKind,
    /// Model name, used to resolve the default model path
    pub model_name: String,
    /// Explicit model file (overrides the default location)
    pub model_path: Option<PathBuf>,
    /// Execution provider for ONNX Runtime
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,
    /// Load the model at construction instead of on first request
    pub eager_model_load: bool,
    /// Enable debug mode (additional logging)
    pub debug: bool,
}

impl ProcessorConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::default()
    }

    /// Configuration of one of the observed deployment profiles
    #[must_use]
    pub fn from_profile(profile: Profile) -> Self {
        let base = Self {
            profile,
            canvas: CanvasConfig::standard(),
            max_input_height: Some(1000),
            straighten: true,
            orientation_threshold: 0,
            max_tilt_degrees: 45.0,
            crop_threshold: 20,
            output_format: OutputFormat::Png,
            webp_quality: 95,
            webp_method: 6,
            extractor: ExtractorKind::default(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_path: None,
            execution_provider: ExecutionProvider::default(),
            intra_threads: 0,
            eager_model_load: false,
            debug: false,
        };

        match profile {
            Profile::Standard => base,
            Profile::Lean => Self {
                max_input_height: Some(800),
                model_name: LEAN_MODEL_NAME.to_string(),
                ..base
            },
            Profile::HighRes => Self {
                canvas: CanvasConfig::high_res(),
                max_input_height: Some(1600),
                output_format: OutputFormat::WebP,
                model_name: LEAN_MODEL_NAME.to_string(),
                ..base
            },
        }
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Invalid canvas constants
    /// - WebP quality above 100 or method above 6
    /// - Zero input height cap or tilt limit outside 0-90
    pub fn validate(&self) -> crate::Result<()> {
        use crate::error::BottleError;

        self.canvas.validate()?;

        if self.webp_quality > 100 {
            return Err(BottleError::config_value_error(
                "WebP quality",
                self.webp_quality,
                "0-100",
                Some(95),
            ));
        }
        if self.webp_method > 6 {
            return Err(BottleError::config_value_error(
                "WebP method",
                self.webp_method,
                "0-6",
                Some(6),
            ));
        }
        if self.max_input_height == Some(0) {
            return Err(BottleError::invalid_config(
                "Maximum input height must be positive",
            ));
        }
        if !(0.0..=90.0).contains(&self.max_tilt_degrees) {
            return Err(BottleError::config_value_error(
                "maximum tilt",
                self.max_tilt_degrees,
                "0-90",
                Some(45.0),
            ));
        }
        Ok(())
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::from_profile(Profile::default())
    }
}

/// Builder for `ProcessorConfig`
#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    /// Start from one of the observed deployment profiles
    #[must_use]
    pub fn from_profile(profile: Profile) -> Self {
        Self {
            config: ProcessorConfig::from_profile(profile),
        }
    }

    #[must_use]
    pub fn canvas(mut self, canvas: CanvasConfig) -> Self {
        self.config.canvas = canvas;
        self
    }

    /// Replace the canvas with one derived for the given size
    #[must_use]
    pub fn canvas_size(mut self, width: u32, height: u32) -> Self {
        self.config.canvas = CanvasConfig::for_size(width, height);
        self
    }

    #[must_use]
    pub fn max_input_height(mut self, height: Option<u32>) -> Self {
        self.config.max_input_height = height;
        self
    }

    #[must_use]
    pub fn straighten(mut self, straighten: bool) -> Self {
        self.config.straighten = straighten;
        self
    }

    #[must_use]
    pub fn orientation_threshold(mut self, threshold: u8) -> Self {
        self.config.orientation_threshold = threshold;
        self
    }

    #[must_use]
    pub fn max_tilt_degrees(mut self, degrees: f32) -> Self {
        self.config.max_tilt_degrees = degrees;
        self
    }

    #[must_use]
    pub fn crop_threshold(mut self, threshold: u8) -> Self {
        self.config.crop_threshold = threshold;
        self
    }

    #[must_use]
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.output_format = format;
        self
    }

    /// Set WebP quality (values above 100 are clamped)
    #[must_use]
    pub fn webp_quality(mut self, quality: u8) -> Self {
        self.config.webp_quality = quality.min(100);
        self
    }

    /// Set WebP method (values above 6 are clamped)
    #[must_use]
    pub fn webp_method(mut self, method: u8) -> Self {
        self.config.webp_method = method.min(6);
        self
    }

    #[must_use]
    pub fn extractor(mut self, extractor: ExtractorKind) -> Self {
        self.config.extractor = extractor;
        self
    }

    #[must_use]
    pub fn model_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.model_name = name.into();
        self
    }

    #[must_use]
    pub fn model_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.model_path = path;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    #[must_use]
    pub fn eager_model_load(mut self, eager: bool) -> Self {
        self.config.eager_model_load = eager;
        self
    }

    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Any violation reported by [`ProcessorConfig::validate`]
    pub fn build(self) -> crate::Result<ProcessorConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

/// Configuration for the HTTP surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind
    pub bind_address: String,
    /// Largest accepted request body in bytes
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProcessorConfig::default();
        assert_eq!(config.profile, Profile::Standard);
        assert_eq!(config.canvas.target_width, 555);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert_eq!(config.crop_threshold, 20);
        assert_eq!(config.max_input_height, Some(1000));
        assert!(config.straighten);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_profiles() {
        let lean = ProcessorConfig::from_profile(Profile::Lean);
        assert_eq!(lean.max_input_height, Some(800));
        assert_eq!(lean.model_name, LEAN_MODEL_NAME);
        assert_eq!(lean.canvas, CanvasConfig::standard());

        let high_res = ProcessorConfig::from_profile(Profile::HighRes);
        assert_eq!(high_res.canvas.target_width, 1200);
        assert_eq!(high_res.canvas.pad_width, 200);
        assert_eq!(high_res.canvas.pad_height, 250);
        assert_eq!(high_res.canvas.bottom_margin, 100);
        assert_eq!(high_res.canvas.vertical_offset, 10);
        assert!((high_res.canvas.sharpen_factor - 1.3).abs() < f32::EPSILON);
        assert_eq!(high_res.output_format, OutputFormat::WebP);
        assert_eq!(high_res.max_input_height, Some(1600));
        assert_eq!(high_res.webp_quality, 95);
        assert_eq!(high_res.webp_method, 6);
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!("standard".parse::<Profile>().unwrap(), Profile::Standard);
        assert_eq!("HIGH-RES".parse::<Profile>().unwrap(), Profile::HighRes);
        assert_eq!("1200".parse::<Profile>().unwrap(), Profile::HighRes);
        assert_eq!("lean".parse::<Profile>().unwrap(), Profile::Lean);
        assert!("huge".parse::<Profile>().is_err());
        assert_eq!(Profile::HighRes.to_string(), "high-res");
    }

    #[test]
    fn test_canvas_for_observed_sizes_matches_profiles() {
        assert_eq!(CanvasConfig::for_size(555, 555), CanvasConfig::standard());
        assert_eq!(CanvasConfig::for_size(1200, 1200), CanvasConfig::high_res());
    }

    #[test]
    fn test_canvas_for_size_scales_margins() {
        let canvas = CanvasConfig::for_size(1110, 1110);
        // Closer to the high-res profile, so scaled from 1200
        assert_eq!(canvas.pad_width, 185);
        assert_eq!(canvas.bottom_margin, 93);
        assert!((canvas.sharpen_factor - 1.3).abs() < f32::EPSILON);

        let small = CanvasConfig::for_size(300, 300);
        assert_eq!(small.pad_width, 43);
        assert_eq!(small.pad_height, 65);
        assert_eq!(small.vertical_offset, 3);
        assert!(small.validate().is_ok());
    }

    #[test]
    fn test_canvas_validation() {
        let mut canvas = CanvasConfig::standard();
        canvas.pad_width = 555;
        assert!(canvas.validate().is_err());

        let mut canvas = CanvasConfig::standard();
        canvas.shadow_opacity = 1.5;
        let err = canvas.validate().unwrap_err();
        assert!(err.to_string().contains("shadow opacity"));

        let mut canvas = CanvasConfig::standard();
        canvas.bottom_margin = 600;
        assert!(canvas.validate().is_err());

        let mut canvas = CanvasConfig::standard();
        canvas.shadow_blur_radius = -1.0;
        assert!(canvas.validate().is_err());
    }

    #[test]
    fn test_builder_clamping_and_validation() {
        let config = ProcessorConfig::builder()
            .webp_quality(150)
            .webp_method(9)
            .build()
            .unwrap();
        assert_eq!(config.webp_quality, 100);
        assert_eq!(config.webp_method, 6);

        let mut config = ProcessorConfig::default();
        config.webp_quality = 101;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("WebP quality"));

        let result = ProcessorConfig::builder().max_input_height(Some(0)).build();
        assert!(result.is_err());

        let result = ProcessorConfig::builder().max_tilt_degrees(120.0).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_chaining() {
        let config = ProcessorConfigBuilder::from_profile(Profile::HighRes)
            .output_format(OutputFormat::Png)
            .straighten(false)
            .crop_threshold(0)
            .extractor(ExtractorKind::Passthrough)
            .model_path(Some(PathBuf::from("/models/u2netp.onnx")))
            .execution_provider(ExecutionProvider::Cpu)
            .intra_threads(4)
            .eager_model_load(true)
            .build()
            .unwrap();

        assert_eq!(config.profile, Profile::HighRes);
        assert_eq!(config.output_format, OutputFormat::Png);
        assert!(!config.straighten);
        assert_eq!(config.crop_threshold, 0);
        assert_eq!(config.extractor, ExtractorKind::Passthrough);
        assert_eq!(config.execution_provider, ExecutionProvider::Cpu);
        assert_eq!(config.intra_threads, 4);
        assert!(config.eager_model_load);
    }

    #[test]
    fn test_config_serde() {
        let config = ProcessorConfig::from_profile(Profile::HighRes);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"target_width\":1200"));
        assert!(json.contains("\"output_format\":\"WebP\""));

        let deserialized: ProcessorConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_enum_display() {
        assert_eq!(ExecutionProvider::CoreMl.to_string(), "coreml");
        assert_eq!(OutputFormat::WebP.to_string(), "webp");
        assert_eq!(ExtractorKind::Passthrough.to_string(), "passthrough");
    }
}
