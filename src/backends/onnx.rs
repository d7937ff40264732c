//! ONNX Runtime extractor for U2-Net family models
//!
//! Loads a salient-object segmentation model (`u2net`, `u2netp`, ...) from
//! disk on first use and turns its saliency map into the subject's alpha
//! channel. Supports CPU, CUDA and `CoreML` execution providers.

use crate::config::{ExecutionProvider, ProcessorConfig};
use crate::error::{BottleError, Result};
use crate::inference::SubjectExtractor;
use crate::utils::{ImagePreprocessor, PreprocessingConfig};
use image::RgbaImage;
use instant::{Duration, Instant};
use ndarray::{Array4, Ix4};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::{Path, PathBuf};

/// Environment variable overriding the model directory
pub const MODEL_HOME_ENV: &str = "U2NET_HOME";

/// ONNX Runtime backend running a U2-Net style model
#[derive(Debug, Default)]
pub struct OnnxExtractor {
    session: Option<Session>,
    preprocessing: PreprocessingConfig,
    model_path: Option<PathBuf>,
}

impl OnnxExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the model file that will be loaded
    #[must_use]
    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    /// Resolve the model location: explicit path, then `$U2NET_HOME`, then `~/.u2net`
    ///
    /// # Errors
    /// - No explicit path and no home directory to derive one from
    pub fn resolve_model_path(config: &ProcessorConfig) -> Result<PathBuf> {
        if let Some(path) = &config.model_path {
            return Ok(path.clone());
        }

        let file_name = format!("{}.onnx", config.model_name);
        if let Some(home) = std::env::var_os(MODEL_HOME_ENV) {
            return Ok(PathBuf::from(home).join(file_name));
        }

        dirs::home_dir()
            .map(|home| home.join(".u2net").join(file_name))
            .ok_or_else(|| {
                BottleError::model(format!(
                    "Cannot locate model '{}': no home directory, set {} or pass a model path",
                    config.model_name, MODEL_HOME_ENV
                ))
            })
    }

    /// List ONNX Runtime execution providers with their availability
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool)> {
        vec![
            ("CPU".to_string(), true),
            (
                "CUDA".to_string(),
                OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false),
            ),
            (
                "CoreML".to_string(),
                OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                    .unwrap_or(false),
            ),
        ]
    }

    fn execution_providers(provider: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let cuda = CUDAExecutionProvider::default();
        let cuda_available = OrtExecutionProvider::is_available(&cuda).unwrap_or(false);
        let coreml = CoreMLExecutionProvider::default().with_subgraphs(true);
        let coreml_available = OrtExecutionProvider::is_available(&coreml).unwrap_or(false);

        let mut providers = Vec::new();
        match provider {
            ExecutionProvider::Auto => {
                if cuda_available {
                    providers.push(cuda.build());
                }
                if coreml_available {
                    providers.push(coreml.build());
                }
                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                }
            },
            ExecutionProvider::Cuda if cuda_available => providers.push(cuda.build()),
            ExecutionProvider::CoreMl if coreml_available => providers.push(coreml.build()),
            ExecutionProvider::Cuda | ExecutionProvider::CoreMl => {
                log::warn!("{provider} execution provider requested but not available, falling back to CPU");
            },
            ExecutionProvider::Cpu => {},
        }
        providers
    }

    fn load_model(&mut self, config: &ProcessorConfig) -> Result<Duration> {
        let model_load_start = Instant::now();
        let path = Self::resolve_model_path(config)?;
        log::info!("Loading segmentation model from {}", path.display());

        let model_data = std::fs::read(&path)
            .map_err(|e| BottleError::file_io_error("read model file", &path, &e))?;

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
        };

        let session = Session::builder()
            .map_err(|e| BottleError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| BottleError::model(format!("Failed to set optimization level: {e}")))?
            .with_execution_providers(Self::execution_providers(config.execution_provider))
            .map_err(|e| BottleError::model(format!("Failed to set execution providers: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| BottleError::model(format!("Failed to set intra threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                BottleError::model(format!("Failed to create session from {}: {e}", path.display()))
            })?;

        log::debug!(
            "Session ready: provider={}, intra_threads={}, model={:.2} MB",
            config.execution_provider,
            intra_threads,
            model_data.len() as f64 / (1024.0 * 1024.0)
        );

        self.session = Some(session);
        self.model_path = Some(path);

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );
        Ok(model_load_time)
    }

    fn infer(&mut self, input: Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BottleError::extraction("ONNX session not initialized"))?;

        let input_value = Value::from_array(input)
            .map_err(|e| BottleError::extraction(format!("Failed to convert input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BottleError::extraction(format!("ONNX inference failed: {e}")))?;

        // U2-Net emits several side outputs; the fused map comes first
        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| BottleError::extraction("No output tensors found"))?;
        let output = outputs
            .get(first_key)
            .ok_or_else(|| BottleError::extraction("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| BottleError::extraction(format!("Failed to extract output tensor: {e}")))?;

        output
            .to_owned()
            .into_dimensionality::<Ix4>()
            .map_err(|e| BottleError::extraction(format!("Expected 4D output tensor: {e}")))
    }
}

impl SubjectExtractor for OnnxExtractor {
    fn initialize(&mut self, config: &ProcessorConfig) -> Result<Option<Duration>> {
        if self.session.is_some() {
            return Ok(None);
        }
        self.load_model(config).map(Some)
    }

    fn extract(&mut self, image: &RgbaImage) -> Result<RgbaImage> {
        let (width, height) = image.dimensions();
        let tensor = ImagePreprocessor::to_tensor(image, &self.preprocessing)?;

        let inference_start = Instant::now();
        let output = self.infer(tensor)?;
        log::debug!(
            "Inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        let mask = ImagePreprocessor::tensor_to_mask(&output, width, height)?;
        ImagePreprocessor::apply_mask(image, &mask)
    }

    fn name(&self) -> &'static str {
        "onnx"
    }

    fn is_initialized(&self) -> bool {
        self.session.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_model_path_wins() {
        let config = ProcessorConfig::builder()
            .model_path(Some(PathBuf::from("/models/custom.onnx")))
            .build()
            .unwrap();
        assert_eq!(
            OnnxExtractor::resolve_model_path(&config).unwrap(),
            PathBuf::from("/models/custom.onnx")
        );
    }

    #[test]
    fn test_default_model_file_name() {
        let config = ProcessorConfig::builder().model_name("u2netp").build().unwrap();
        let path = OnnxExtractor::resolve_model_path(&config).unwrap();
        assert!(path.ends_with("u2netp.onnx"));
    }

    #[test]
    fn test_missing_model_fails_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProcessorConfig::builder()
            .model_path(Some(dir.path().join("absent.onnx")))
            .build()
            .unwrap();

        let mut extractor = OnnxExtractor::new();
        let err = extractor.initialize(&config).unwrap_err();
        assert!(err.to_string().contains("absent.onnx"));
        assert!(!extractor.is_initialized());
    }

    #[test]
    fn test_extract_requires_initialization() {
        let mut extractor = OnnxExtractor::new();
        let image = RgbaImage::new(16, 16);
        assert!(extractor.extract(&image).is_err());
    }

    #[test]
    fn test_cpu_always_listed() {
        let providers = OnnxExtractor::list_providers();
        assert!(providers.iter().any(|(name, available)| name == "CPU" && *available));
    }
}
