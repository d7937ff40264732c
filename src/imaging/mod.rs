//! Deterministic image stages of the bottle pipeline
//!
//! Each stage is a plain function from image to image. The best-effort
//! stages (orientation, crop) never fail; they report a
//! [`crate::types::StageOutcome`] instead.

pub mod compositor;
pub mod crop;
pub mod enhance;
pub mod loader;
pub mod mask;
pub mod orientation;

pub use compositor::{compose, render_shadow};
pub use crop::{content_bounds, crop_to_content};
pub use enhance::{paste_with_alpha_mask, sharpen};
pub use loader::normalize_input;
pub use mask::OpacityMask;
pub use orientation::{detect_tilt, min_area_rect, normalize_orientation, rotate_expand};
