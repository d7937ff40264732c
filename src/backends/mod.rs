//! Subject extractor implementations
//!
//! - ONNX Runtime extractor for U2-Net family models (feature `onnx`)
//! - Passthrough extractor for inputs that already carry an alpha channel

#[cfg(feature = "onnx")]
pub mod onnx;

pub mod passthrough;

// Test utilities for extractor testing
#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxExtractor;

pub use self::passthrough::PassthroughExtractor;
