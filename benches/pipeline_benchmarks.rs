use bottle_studio::imaging::{compose, crop_to_content, detect_tilt, normalize_orientation, sharpen};
use bottle_studio::{
    BottleProcessor, CanvasConfig, ExtractorKind, OutputFormat, OutputFormatHandler, ProcessorConfigBuilder,
    Profile,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point;
use std::io::Cursor;

/// Opaque bottle-shaped quad tilted by a few degrees on a transparent canvas
fn synthetic_bottle(size: u32) -> RgbaImage {
    let mut image = RgbaImage::new(size, size);
    let s = size as i32;
    let corners = [
        Point::new(s * 2 / 5, s / 10),
        Point::new(s * 3 / 5 + s / 20, s / 8),
        Point::new(s * 3 / 5, s * 9 / 10),
        Point::new(s * 2 / 5 - s / 20, s * 7 / 8),
    ];
    draw_polygon_mut(&mut image, &corners, Rgba([30, 90, 140, 255]));
    image
}

fn encode_png(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode benchmark input");
    bytes
}

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");
    group.sample_size(20);

    for size in [512u32, 1000] {
        let image = synthetic_bottle(size);

        group.bench_with_input(BenchmarkId::new("detect_tilt", size), &image, |b, img| {
            b.iter(|| detect_tilt(black_box(img), 0, 45.0));
        });

        group.bench_with_input(BenchmarkId::new("orientation", size), &image, |b, img| {
            b.iter(|| normalize_orientation(DynamicImage::ImageRgba8(black_box(img.clone())), 0, 45.0));
        });

        group.bench_with_input(BenchmarkId::new("crop", size), &image, |b, img| {
            b.iter(|| crop_to_content(DynamicImage::ImageRgba8(black_box(img.clone())), 20));
        });

        group.bench_with_input(BenchmarkId::new("composite_555", size), &image, |b, img| {
            let canvas = CanvasConfig::standard();
            b.iter(|| compose(black_box(img), &canvas));
        });
    }

    let subject = synthetic_bottle(435);
    group.bench_function("sharpen_435", |b| b.iter(|| sharpen(black_box(&subject), 1.5)));

    let (canvas, _) = compose(&subject, &CanvasConfig::high_res()).expect("compose benchmark canvas");
    group.bench_function("encode_png_1200", |b| {
        b.iter(|| OutputFormatHandler::encode(black_box(&canvas), OutputFormat::Png, 95, 6));
    });
    group.bench_function("encode_webp_1200", |b| {
        b.iter(|| OutputFormatHandler::encode(black_box(&canvas), OutputFormat::WebP, 95, 6));
    });

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);

    let input = encode_png(&synthetic_bottle(1000));
    for profile in [Profile::Standard, Profile::HighRes] {
        let config = ProcessorConfigBuilder::from_profile(profile)
            .extractor(ExtractorKind::Passthrough)
            .build()
            .expect("benchmark config");
        let mut processor = BottleProcessor::new(config).expect("benchmark processor");

        group.bench_with_input(BenchmarkId::new("process_bytes", profile), &input, |b, bytes| {
            b.iter(|| processor.process_bytes(black_box(bytes)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_stages, bench_pipeline);
criterion_main!(benches);
