//! Synthetic bottle fixtures shared by the integration tests

#![allow(dead_code)]

use bottle_studio::{BottleProcessor, ExtractorKind, ProcessorConfig, ProcessorConfigBuilder, Profile};
use image::{ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_polygon_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use std::io::Cursor;

pub const GLASS: Rgba<u8> = Rgba([40, 110, 60, 255]);

/// Upright bottle (body and neck) on a transparent background
pub fn upright_bottle(width: u32, height: u32) -> RgbaImage {
    let mut image = RgbaImage::new(width, height);
    let body_w = width / 2;
    let body_h = height * 3 / 5;
    let neck_w = (width / 6).max(1);
    let neck_h = height / 4;
    let bottom = height - height / 10;

    draw_filled_rect_mut(
        &mut image,
        Rect::at(((width - body_w) / 2) as i32, (bottom - body_h) as i32).of_size(body_w, body_h),
        GLASS,
    );
    draw_filled_rect_mut(
        &mut image,
        Rect::at(((width - neck_w) / 2) as i32, (bottom - body_h - neck_h) as i32).of_size(neck_w, neck_h),
        GLASS,
    );
    image
}

/// A `w x h` opaque rectangle rotated by `degrees` around the center of a square canvas
pub fn tilted_bottle(canvas: u32, w: f64, h: f64, degrees: f64) -> RgbaImage {
    let mut image = RgbaImage::new(canvas, canvas);
    let (sin, cos) = degrees.to_radians().sin_cos();
    let c = f64::from(canvas) / 2.0;

    let corners: Vec<Point<i32>> = [(-w / 2.0, -h / 2.0), (w / 2.0, -h / 2.0), (w / 2.0, h / 2.0), (-w / 2.0, h / 2.0)]
        .iter()
        .map(|&(x, y)| {
            Point::new(
                (c + x * cos - y * sin).round() as i32,
                (c + x * sin + y * cos).round() as i32,
            )
        })
        .collect();
    draw_polygon_mut(&mut image, &corners, GLASS);
    image
}

/// Fully opaque rectangle, the simplest pre-cut subject
pub fn opaque_block(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, GLASS)
}

pub fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    bytes
}

/// Configuration that keeps the input's own alpha instead of running a model
pub fn passthrough_config(profile: Profile) -> ProcessorConfig {
    ProcessorConfigBuilder::from_profile(profile)
        .extractor(ExtractorKind::Passthrough)
        .build()
        .unwrap()
}

pub fn passthrough_processor(profile: Profile) -> BottleProcessor {
    BottleProcessor::new(passthrough_config(profile)).unwrap()
}
