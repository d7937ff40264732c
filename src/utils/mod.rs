//! Shared helpers for the segmentation backends

pub mod preprocessing;

pub use preprocessing::{ImagePreprocessor, PreprocessingConfig};
